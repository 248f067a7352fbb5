use std::fmt::{Debug, Display, Formatter};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};

const SEGMENT_BITS: u8 = 0x7f;
const CONTINUE_BIT: u8 = 0x80;
const MAX_STRING_LEN: usize = 32767;

fn io_err(context: &str, e: std::io::Error) -> String {
    format!("IO error while reading {context}: {e}")
}

#[derive(Ord, PartialOrd, Eq, PartialEq, Clone, Copy)]
pub(crate) struct VarInt {
    pub(crate) value: i32,
}

impl From<usize> for VarInt {
    fn from(value: usize) -> Self {
        Self {
            value: value as i32,
        }
    }
}

impl From<i32> for VarInt {
    fn from(value: i32) -> Self {
        Self { value }
    }
}

impl Display for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Debug for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[async_trait]
impl ReadProt for VarInt {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
        let mut value: i32 = 0;
        let mut pos: u32 = 0;
        loop {
            let byte = stream.read_u8().await.map_err(|e| io_err("VarInt", e))?;
            value |= ((byte & SEGMENT_BITS) as i32) << pos;
            if byte & CONTINUE_BIT == 0 {
                return Ok(Self { value });
            }
            pos += 7;
            if pos >= 32 {
                return Err("VarInt is too big".into());
            }
        }
    }
}

#[async_trait]
impl WriteProt for VarInt {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        let mut x = self.value as u32;
        let mut buf = Vec::with_capacity(5);
        loop {
            let mut byte = (x & SEGMENT_BITS as u32) as u8;
            x >>= 7;
            if x != 0 {
                byte |= CONTINUE_BIT;
            }
            buf.push(byte);
            if x == 0 {
                break;
            }
        }
        stream
            .write_all(&buf)
            .await
            .map_err(|e| format!("IO error: {e}"))
    }
}

impl SizedProt for VarInt {
    fn prot_size(&self) -> usize {
        let mut x = self.value as u32;
        let mut count = 1;
        while x >= 0x80 {
            x >>= 7;
            count += 1;
        }
        count
    }
}

/// Fixed-width big-endian numbers map straight onto tokio's read/write helpers.
macro_rules! fixed_width {
    ($ty:ty, $size:literal, $read:ident, $write:ident) => {
        #[async_trait]
        impl ReadProt for $ty {
            async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
                stream
                    .$read()
                    .await
                    .map_err(|e| io_err(stringify!($ty), e))
            }
        }

        #[async_trait]
        impl WriteProt for $ty {
            async fn write(
                &self,
                stream: &mut (impl AsyncWrite + Unpin + Send),
            ) -> Result<(), String> {
                stream
                    .$write(*self)
                    .await
                    .map_err(|e| format!("IO error: {e}"))
            }
        }

        impl SizedProt for $ty {
            fn prot_size(&self) -> usize {
                $size
            }
        }
    };
}

fixed_width!(u8, 1, read_u8, write_u8);
fixed_width!(i32, 4, read_i32, write_i32);
fixed_width!(i64, 8, read_i64, write_i64);
fixed_width!(u64, 8, read_u64, write_u64);
fixed_width!(f32, 4, read_f32, write_f32);

#[async_trait]
impl ReadProt for bool {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
        match u8::read(stream).await? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            other => Err(format!("Invalid bool byte 0x{other:02x}")),
        }
    }
}

#[async_trait]
impl WriteProt for bool {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        u8::from(*self).write(stream).await
    }
}

impl SizedProt for bool {
    fn prot_size(&self) -> usize {
        1
    }
}

#[async_trait]
impl ReadProt for String {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
        let len = VarInt::read(stream).await?.value;
        if len < 0 || len as usize > MAX_STRING_LEN {
            return Err(format!("String length {len} out of range"));
        }
        let mut buf = vec![0u8; len as usize];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| io_err("String", e))?;
        String::from_utf8(buf).map_err(|e| format!("UTF8 error: {e}"))
    }
}

#[async_trait]
impl WriteProt for String {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        VarInt::from(self.len()).write(stream).await?;
        stream
            .write_all(self.as_bytes())
            .await
            .map_err(|e| format!("IO error: {e}"))
    }
}

impl SizedProt for String {
    fn prot_size(&self) -> usize {
        VarInt::from(self.len()).prot_size() + self.len()
    }
}

/// A VarInt element count followed by the elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SizedVec<T>
where
    T: Send + Sync,
{
    pub(crate) vec: Vec<T>,
}

impl<T> From<Vec<T>> for SizedVec<T>
where
    T: Send + Sync,
{
    fn from(value: Vec<T>) -> Self {
        Self { vec: value }
    }
}

#[async_trait]
impl<T> WriteProt for SizedVec<T>
where
    T: WriteProt + Sync + Send,
{
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        VarInt::from(self.vec.len()).write(stream).await?;
        for item in &self.vec {
            item.write(stream).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> ReadProt for SizedVec<T>
where
    T: ReadProt + Sync + Send,
{
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
        let len = VarInt::read(stream).await?.value;
        if len < 0 {
            return Err(format!("Negative array length {len}"));
        }
        // the count is untrusted; the frame bound stops a lying one when the elements run out
        let mut vec = Vec::with_capacity((len as usize).min(4096));
        for _ in 0..len {
            vec.push(T::read(stream).await?);
        }
        Ok(Self { vec })
    }
}

impl<T> SizedProt for SizedVec<T>
where
    T: SizedProt + Send + Sync,
{
    fn prot_size(&self) -> usize {
        VarInt::from(self.vec.len()).prot_size()
            + self.vec.iter().map(|x| x.prot_size()).sum::<usize>()
    }
}

/// A presence flag, then the value if present.
#[async_trait]
impl<T> ReadProt for Option<T>
where
    T: ReadProt + Send,
{
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
        if bool::read(stream).await? {
            Ok(Some(T::read(stream).await?))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl<T> WriteProt for Option<T>
where
    T: WriteProt + Sync,
{
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        self.is_some().write(stream).await?;
        if let Some(x) = self {
            x.write(stream).await?;
        }
        Ok(())
    }
}

impl<T> SizedProt for Option<T>
where
    T: SizedProt,
{
    fn prot_size(&self) -> usize {
        1 + self.as_ref().map_or(0, |x| x.prot_size())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use test_case::test_case;

    use super::*;

    #[test_case(0, &[0x00])]
    #[test_case(1, &[0x01])]
    #[test_case(127, &[0x7f])]
    #[test_case(128, &[0x80, 0x01])]
    #[test_case(255, &[0xff, 0x01])]
    #[test_case(25565, &[0xdd, 0xc7, 0x01])]
    #[test_case(2097151, &[0xff, 0xff, 0x7f])]
    #[test_case(2147483647, &[0xff, 0xff, 0xff, 0xff, 0x07])]
    #[test_case(-1, &[0xff, 0xff, 0xff, 0xff, 0x0f])]
    #[test_case(-2147483648, &[0x80, 0x80, 0x80, 0x80, 0x08])]
    #[tokio::test]
    async fn varint_encoding(value: i32, expected: &[u8]) -> Result<(), String> {
        let mut buf: Vec<u8> = vec![];
        VarInt::from(value).write(&mut buf).await?;
        assert_eq!(buf, expected);
        assert_eq!(VarInt::from(value).prot_size(), expected.len());
        assert_eq!(VarInt::read(&mut Cursor::new(buf)).await?.value, value);
        Ok(())
    }

    #[tokio::test]
    async fn varint_rejects_overlong() {
        let mut stream = Cursor::new(vec![0xff; 6]);
        assert!(VarInt::read(&mut stream).await.is_err());
    }

    #[tokio::test]
    async fn numbers_are_big_endian() -> Result<(), String> {
        let mut buf: Vec<u8> = vec![];
        0x0102_0304i32.write(&mut buf).await?;
        (-2i64).write(&mut buf).await?;
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(&buf[4..], &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]);
        Ok(())
    }

    #[tokio::test]
    async fn options_carry_a_flag() -> Result<(), String> {
        let mut buf: Vec<u8> = vec![];
        Some(7i64).write(&mut buf).await?;
        None::<i64>.write(&mut buf).await?;
        assert_eq!(buf.len(), 1 + 8 + 1);
        assert_eq!(Some(7i64).prot_size() + None::<i64>.prot_size(), buf.len());
        let mut stream = Cursor::new(buf);
        assert_eq!(Option::<i64>::read(&mut stream).await?, Some(7));
        assert_eq!(Option::<i64>::read(&mut stream).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn sized_vec_counts_elements() -> Result<(), String> {
        let vec: SizedVec<i32> = vec![1, -1, 300].into();
        let mut buf: Vec<u8> = vec![];
        vec.write(&mut buf).await?;
        assert_eq!(buf[0], 3);
        assert_eq!(buf.len(), vec.prot_size());
        assert_eq!(SizedVec::<i32>::read(&mut Cursor::new(buf)).await?, vec);
        Ok(())
    }

    #[tokio::test]
    async fn truncated_input_is_an_error() {
        let mut stream = Cursor::new(vec![0x05, b'a', b'b']);
        assert!(String::read(&mut stream).await.is_err());
        let mut stream = Cursor::new(vec![0x02]);
        assert!(bool::read(&mut stream).await.is_err());
        let mut stream = Cursor::new(vec![0x10, 0x00]);
        assert!(SizedVec::<u8>::read(&mut stream).await.is_err());
    }
}
