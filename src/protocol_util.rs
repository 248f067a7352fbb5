use std::ascii::escape_default;
use std::env;

/// Printable form of raw frame bytes for logs.
pub(crate) fn show(bs: &[u8]) -> String {
    bs.iter()
        .flat_map(|&b| escape_default(b))
        .map(char::from)
        .collect()
}

pub(crate) fn log_packets() -> bool {
    env::var("LOG_PACKETS").is_ok_and(|s| s == "true")
}

/// Declares a packet struct with its id, constructor, size, display name, field reader and
/// frame writer.
#[macro_export]
macro_rules! packet_base {
    ($packet_name:ident $id:literal {
        $( $field:ident : $field_type:ty ),* $(,)*
    }) => {
        #[derive(Debug, Clone, PartialEq)]
        pub(crate) struct $packet_name {
            $(
                pub(crate) $field : $field_type,
            )*
        }

        impl $packet_name {
            pub(crate) const ID: i32 = $id;

            #[allow(clippy::too_many_arguments)]
            pub(crate) fn new($($field : $field_type,)*) -> Self {
                Self {
                    $(
                        $field,
                    )*
                }
            }
        }

        impl SizedProt for $packet_name {
            fn prot_size(&self) -> usize {
                VarInt::from(Self::ID).prot_size() $(+ self.$field.prot_size())*
            }
        }

        impl Display for $packet_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", stringify!($packet_name))
            }
        }

        #[async_trait]
        impl ReadProt for $packet_name {
            #[allow(unused_variables)]
            async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
                Ok($packet_name {
                    $(
                        $field: <$field_type>::read(stream).await?,
                    )*
                })
            }
        }

        #[async_trait]
        impl WriteProt for $packet_name {
            async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
                if $crate::protocol_util::log_packets() {
                    debug!("Outbound packet: {self:?}");
                }
                VarInt::from(self.prot_size()).write(stream).await?;
                VarInt::from(Self::ID).write(stream).await?;
                $(
                    self.$field.write(stream).await?;
                )*
                Ok(())
            }
        }
    };
}

#[macro_export]
macro_rules! packet {
    // handler provided: server-bound packet
    ($packet_name:ident $id:literal {
        $( $field:ident : $field_type:ty ),* $(,)*
    }, handler |$this:ident, $conn:ident, $assets:ident| $closure:expr) => {
        packet_base!($packet_name $id {
            $( $field : $field_type ),*
        });

        #[async_trait]
        impl ServerPacket for $packet_name {
            async fn handle(
                &self,
                $conn: Arc<RwLock<ConnectionInfo>>,
                $assets: Arc<Assets>,
            ) -> Result<Vec<Outbound>, ProtError> {
                let $this = self;
                $closure
            }
        }
    };
    // no handler provided: client-bound packet
    ($packet_name:ident $id:literal {
        $( $field:ident : $field_type:ty ),* $(,)*
    }) => {
        packet_base!($packet_name $id {
            $( $field : $field_type ),*
        });

        impl ClientPacket for $packet_name {}
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn show_escapes_binary() {
        assert_eq!(show(b"ab\x00\n"), "ab\\x00\\n");
    }
}
