#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    BufferOverflow,
    DataUnderflow,
    InvalidFormat,
}

/// A read cursor over a byte slice
pub struct BytesIn<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BytesIn<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.offset == self.data.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn byte(&mut self) -> Result<u8, Error> {
        self.arr::<1>().map(|arr| arr[0])
    }

    pub fn be_u16(&mut self) -> Result<u16, Error> {
        self.arr().map(u16::from_be_bytes)
    }

    pub fn be_u32(&mut self) -> Result<u32, Error> {
        self.arr().map(u32::from_be_bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.slice(len).map(|_| ())
    }

    pub fn slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if len > self.data.len() - self.offset {
            Err(Error::DataUnderflow)
        } else {
            let data = &self.data[self.offset..self.offset + len];
            self.offset += len;

            Ok(data)
        }
    }

    pub fn arr<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let slice = self.slice(N)?;

        let mut data = [0; N];
        data.copy_from_slice(slice);

        Ok(data)
    }

    pub fn remaining(&mut self) -> &'a [u8] {
        let data = &self.data[self.offset..];

        self.offset = self.data.len();

        data
    }

    pub fn remaining_byte(&mut self) -> Result<u8, Error> {
        Ok(self.remaining_arr::<1>()?[0])
    }

    /// Consumes the rest of the data, which must be exactly `N` bytes long
    pub fn remaining_arr<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        if self.data.len() - self.offset != N {
            Err(Error::InvalidFormat)
        } else {
            self.arr::<N>()
        }
    }
}

/// A write cursor over a mutable byte slice
pub struct BytesOut<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> BytesOut<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.offset
    }

    pub fn byte(&mut self, data: u8) -> Result<&mut Self, Error> {
        self.push(&[data])
    }

    pub fn be_u16(&mut self, data: u16) -> Result<&mut Self, Error> {
        self.push(&data.to_be_bytes())
    }

    pub fn be_u32(&mut self, data: u32) -> Result<&mut Self, Error> {
        self.push(&data.to_be_bytes())
    }

    pub fn zeroes(&mut self, len: usize) -> Result<&mut Self, Error> {
        if len > self.buf.len() - self.offset {
            Err(Error::BufferOverflow)
        } else {
            self.buf[self.offset..self.offset + len].fill(0);
            self.offset += len;

            Ok(self)
        }
    }

    pub fn push(&mut self, data: &[u8]) -> Result<&mut Self, Error> {
        if data.len() > self.buf.len() - self.offset {
            Err(Error::BufferOverflow)
        } else {
            self.buf[self.offset..self.offset + data.len()].copy_from_slice(data);
            self.offset += data.len();

            Ok(self)
        }
    }
}
