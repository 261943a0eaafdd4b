pub mod gateway;
pub mod headers;
pub mod routing;
pub mod transcoder;

pub use gateway::GatewayService;
pub use routing::{RouteEntry, RouteTable, RouteTableError};
pub use transcoder::{InboundRequest, OutboundResult};
