//! 16-byte opaque identifiers for subscribers, publishers and syncboxes.

use std::fmt;

use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            pub fn generate() -> Self {
                Self(*Uuid::new_v4().as_bytes())
            }

            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", Uuid::from_bytes(self.0))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; 16])
            }
        }
    };
}

id_newtype!(SubscriberId);
id_newtype!(PublisherId);
id_newtype!(SyncboxId);
