//! Cluster-connection and request-routing core for a Cassandra-compatible
//! wide-column driver: contact-point resolution, protocol negotiation,
//! topology/token-map bookkeeping, and the load-balancing policy chain that
//! turns a query into an ordered host plan.
//!
//! The CQL wire codec, prepared-statement cache, TLS engine internals, and
//! concrete I/O reactor are external collaborators this crate depends on
//! through narrow trait seams ([`control_connection::ControlChannel`],
//! [`connector::ChannelFactory`]) rather than implementing directly.

#[cfg(feature = "cloud")]
pub mod cloud;
pub mod connector;
pub mod control_connection;
pub mod errors;
pub mod host;
pub mod load_balancing;
pub mod locator;
pub mod partitioner;
pub mod registry;
pub mod routing;
pub mod session;
pub mod settings;
pub mod topology;

pub use connector::{ChannelFactory, ClusterConnector};
pub use errors::{BuildError, ClusterError, ControlConnectionError, SslErrorCode, TokenParseError};
pub use host::{Address, Host, HostMap, HostVec};
pub use load_balancing::{Distance, LoadBalancingPolicy, PolicyChainBuilder, QueryPlan, RequestContext};
pub use locator::TokenMap;
pub use partitioner::{PartitionerKind, Token};
pub use registry::{ClusterListener, HostRegistry};
pub use session::{Session, SessionError, SessionState};
pub use settings::{ClusterSettings, ClusterSettingsBuilder, ReconnectionPolicy};
pub use topology::KeyspaceMetadata;
