use std::fmt;

/// Checksum applied to frames on a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ChecksumType {
    /// No checksum.
    #[default]
    None,

    /// CRC-32 over each frame's payload.
    Crc32,
}

/// Options for establishing a new connection.
///
/// The registry treats these as opaque and hands them to the [`Connector`][super::Connector]
/// on every dial.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConnectionOptions {
    /// Size of the per-connection send queue, in frames.
    pub send_buffer_size: usize,

    /// Size of the per-connection receive queue, in frames.
    pub recv_buffer_size: usize,

    /// Checksum used for outgoing frames.
    pub checksum: ChecksumType,

    /// Name this process advertises to the remote side during connection setup.
    pub process_name: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            send_buffer_size: 512,
            recv_buffer_size: 512,
            checksum: ChecksumType::default(),
            process_name: None,
        }
    }
}

impl ConnectionOptions {
    /// Set the process name advertised to the remote side.
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    /// Set the frame checksum.
    pub fn with_checksum(mut self, checksum: ChecksumType) -> Self {
        self.checksum = checksum;
        self
    }
}

/// Encoding of a call's arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Format {
    /// Raw bytes.
    #[default]
    Raw,

    /// JSON.
    Json,

    /// Thrift.
    Thrift,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Raw => f.write_str("raw"),
            Format::Json => f.write_str("json"),
            Format::Thrift => f.write_str("thrift"),
        }
    }
}

/// Options for a single outbound call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct CallOptions {
    /// Encoding of the call's arguments.
    pub format: Format,

    /// Key used by routers to pick a shard for the call.
    pub shard_key: Option<String>,
}

impl CallOptions {
    /// Options with the given argument format.
    pub fn with_format(format: Format) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Set the shard key.
    pub fn shard_key(mut self, key: impl Into<String>) -> Self {
        self.shard_key = Some(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensible_defaults() {
        let options = ConnectionOptions::default();
        assert!(options.send_buffer_size > 0);
        assert!(options.recv_buffer_size > 0);
        assert_eq!(options.checksum, ChecksumType::None);

        let call = CallOptions::default();
        assert_eq!(call.format, Format::Raw);
        assert!(call.shard_key.is_none());
    }

    #[test]
    fn builders() {
        let options = ConnectionOptions::default()
            .with_process_name("keyvalue-client")
            .with_checksum(ChecksumType::Crc32);
        assert_eq!(options.process_name.as_deref(), Some("keyvalue-client"));
        assert_eq!(options.checksum, ChecksumType::Crc32);

        let call = CallOptions::with_format(Format::Thrift).shard_key("user-42");
        assert_eq!(call.format, Format::Thrift);
        assert_eq!(call.shard_key.as_deref(), Some("user-42"));
        assert_eq!(call.format.to_string(), "thrift");
    }
}
