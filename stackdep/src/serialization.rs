//! Binary serialization of model parameters.

use std::io::{Read, Write};

use failure::Error;

use crate::model::{FeedForward, FeedForwardParams};

pub trait CborRead
where
    Self: Sized,
{
    fn from_cbor_read<R>(read: R) -> Result<Self, Error>
    where
        R: Read;
}

macro_rules! cbor_read {
    ($type: ty) => {
        impl CborRead for $type {
            fn from_cbor_read<R>(read: R) -> Result<Self, Error>
            where
                R: Read,
            {
                let value = serde_cbor::from_reader(read)?;
                Ok(value)
            }
        }
    };
}

cbor_read!(FeedForward);
cbor_read!(FeedForwardParams);

pub trait CborWrite {
    fn to_cbor_write<W>(&self, write: &mut W) -> Result<(), Error>
    where
        W: Write;
}

macro_rules! cbor_write {
    ($type: ty) => {
        impl CborWrite for $type {
            fn to_cbor_write<W>(&self, write: &mut W) -> Result<(), Error>
            where
                W: Write,
            {
                let data = serde_cbor::to_vec(self)?;
                write.write_all(&data)?;
                write.flush()?;
                Ok(())
            }
        }
    };
}

cbor_write!(FeedForward);
cbor_write!(FeedForwardParams);
