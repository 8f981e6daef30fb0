//! Value types shared by the client and the CLI.

mod bitfield;
mod byte_size;
mod token_amount;

pub use bitfield::BitField;
pub use byte_size::{ByteSize, format_bytes};
pub use token_amount::{TokenAmount, format_fil};
