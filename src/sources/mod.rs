//! Collaborators at the edge of the client: the remote gateway and the
//! content parser.

mod gateway;
mod parser;

#[cfg(feature = "remote")]
mod http;

pub use gateway::{ConfigGateway, RemoteConfig};
pub use parser::{ConfigurationParser, PropertiesParser};

#[cfg(feature = "yaml")]
pub use parser::YamlParser;

#[cfg(feature = "remote")]
pub use http::{HttpGateway, HttpGatewayBuilder};
