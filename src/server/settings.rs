// SPDX-License-Identifier: GPL-3.0-or-later
use serde::de::{self, Deserialize, Deserializer};

use std::net;

/// Room for the boundaries and part headers around the uploaded file.
const MULTIPART_OVERHEAD: u64 = 16 * 1024;

fn deserialize_upload_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let size = u64::deserialize(deserializer)?;
    if size == 0 {
        Err(de::Error::invalid_value(
            de::Unexpected::Unsigned(size),
            &"an upload size larger than 0",
        ))
    } else {
        Ok(size)
    }
}

#[derive(Clone, Debug, serde::Deserialize, PartialEq)]
#[serde(default)]
pub(crate) struct ServerSettings {
    /// The address to listen on. Defaults to `127.0.0.1`.
    address: net::IpAddr,

    /// The port to listen on. Defaults to `8000`.
    port: u16,

    /// The largest file accepted in an upload, in bytes. Defaults to 10 MiB.
    #[serde(deserialize_with = "deserialize_upload_size")]
    pub(crate) max_upload_size: u64,
}

impl ServerSettings {
    /// The largest multipart request body accepted.
    ///
    /// A file of exactly `max_upload_size` bytes still fits once it's wrapped in a form.
    pub(crate) fn body_limit(&self) -> u64 {
        self.max_upload_size.saturating_add(MULTIPART_OVERHEAD)
    }
}

impl From<ServerSettings> for net::SocketAddr {
    fn from(settings: ServerSettings) -> Self {
        net::SocketAddr::new(settings.address, settings.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: net::Ipv4Addr::LOCALHOST.into(),
            port: 8000,
            max_upload_size: 10 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ServerSettings, MULTIPART_OVERHEAD};
    use std::net::SocketAddr;

    #[test]
    fn defaults() {
        let parsed: ServerSettings = toml::from_str("").unwrap();
        assert_eq!(parsed, ServerSettings::default());
        assert_eq!(SocketAddr::from(parsed.clone()), "127.0.0.1:8000".parse().unwrap());
        assert_eq!(parsed.max_upload_size, 10_485_760);
    }

    #[test]
    fn listen_address() {
        let parsed: ServerSettings =
            toml::from_str("address = \"2001:db8::1\"\nport = 8080").unwrap();
        assert_eq!(SocketAddr::from(parsed), "[2001:db8::1]:8080".parse().unwrap());
        let bad_port: Result<ServerSettings, _> = toml::from_str("port = 70000");
        assert!(bad_port.is_err(), "Accepted an out of range port");
    }

    #[test]
    fn upload_size() {
        let parsed: ServerSettings = toml::from_str("max_upload_size = 2048").unwrap();
        assert_eq!(parsed.max_upload_size, 2048);
        assert_eq!(parsed.body_limit(), 2048 + MULTIPART_OVERHEAD);
    }

    #[test]
    fn invalid_upload_size() {
        for source in &[
            "max_upload_size = 0",
            "max_upload_size = -1",
            "max_upload_size = \"10MB\"",
        ] {
            let parsed: Result<ServerSettings, _> = toml::from_str(source);
            assert!(parsed.is_err(), "Accepted {:?}", source);
        }
    }

}
