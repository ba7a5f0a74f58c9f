// Copyright (c) 2024 The Quic-Frames Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::Error;
use crate::Result;

/// The maximum value for QUIC variable-length integer encoding.
/// See draft-ietf-quic-transport-14 Section 7.1
pub const VINT_MAX: u64 = 4_611_686_018_427_387_903;

/// Encoder for QUIC wire data
pub trait Encoder {
    /// Write a single octet to self.
    fn write_u8(&mut self, n: u8) -> Result<usize>;

    /// Write an unsigned 16 bit integer to self in network byte order.
    fn write_u16(&mut self, n: u16) -> Result<usize>;

    /// Write `n` to self in QUIC variable-length integer encoding, using
    /// the shortest form. Values above [`VINT_MAX`] are rejected.
    fn write_varint(&mut self, n: u64) -> Result<usize>;

    /// Write a slice to self verbatim.
    fn write(&mut self, src: &[u8]) -> Result<usize>;
}

/// Decoder for QUIC wire data
pub trait Decoder {
    /// Read a single octet from self.
    fn read_u8(&mut self) -> Result<u8>;

    /// Read an unsigned 16 bit integer from self in network byte order.
    fn read_u16(&mut self) -> Result<u16>;

    /// Read a QUIC variable-length integer from self.
    fn read_varint(&mut self) -> Result<u64>;

    /// Read exactly `len` bytes from self.
    fn read(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Read a varint length prefix and then that many bytes.
    fn read_with_varint_length(&mut self) -> Result<Vec<u8>>;

    /// Advance self past `len` bytes.
    fn skip(&mut self, len: usize) -> Result<()>;
}

/// Guard that `need` bytes are available before a read or write.
fn check_remaining(have: usize, need: usize) -> Result<()> {
    if have < need {
        return Err(Error::MalformedFrame);
    }
    Ok(())
}

impl Encoder for &mut [u8] {
    fn write_u8(&mut self, n: u8) -> Result<usize> {
        self.write(&[n])
    }

    fn write_u16(&mut self, n: u16) -> Result<usize> {
        self.write(&n.to_be_bytes())
    }

    fn write_varint(&mut self, n: u64) -> Result<usize> {
        if n > VINT_MAX {
            return Err(Error::MalformedFrame);
        }
        let len = encode_varint_len(n);
        check_remaining(self.len(), len)?;

        // The value in big-endian order, with the length tag folded into
        // the two high bits of the leading byte.
        let tag = match len {
            1 => 0x00,
            2 => 0x40,
            4 => 0x80,
            8 => 0xc0,
            _ => unreachable!(),
        };
        let bytes = n.to_be_bytes();
        self.write_u8(bytes[8 - len] | tag)?;
        self.write(&bytes[8 - len + 1..])?;

        Ok(len)
    }

    fn write(&mut self, src: &[u8]) -> Result<usize> {
        check_remaining(self.len(), src.len())?;
        let (head, rest) = std::mem::take(self).split_at_mut(src.len());
        head.copy_from_slice(src);
        *self = rest;
        Ok(src.len())
    }
}

impl Decoder for &[u8] {
    fn read_u8(&mut self) -> Result<u8> {
        check_remaining(self.len(), 1)?;
        let v = self[0];
        *self = &self[1..];
        Ok(v)
    }

    fn read_u16(&mut self) -> Result<u16> {
        check_remaining(self.len(), 2)?;
        let v = u16::from_be_bytes([self[0], self[1]]);
        *self = &self[2..];
        Ok(v)
    }

    fn read_varint(&mut self) -> Result<u64> {
        check_remaining(self.len(), 1)?;
        let len = decode_varint_len(self[0]);
        check_remaining(self.len(), len)?;

        let mut v = u64::from(self[0] & 0x3f);
        for byte in &self[1..len] {
            v = (v << 8) | u64::from(*byte);
        }
        *self = &self[len..];

        Ok(v)
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        check_remaining(self.len(), len)?;
        let (head, rest) = self.split_at(len);
        let vec = head.to_vec();
        *self = rest;
        Ok(vec)
    }

    fn read_with_varint_length(&mut self) -> Result<Vec<u8>> {
        let len = self.read_varint()?;
        self.read(len as usize)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        check_remaining(self.len(), len)?;
        *self = &self[len..];
        Ok(())
    }
}

/// Return the length of a varint given its first byte.
///
/// The two most significant bits of the first byte encode the base-2
/// logarithm of the total encoding length in bytes.
pub fn decode_varint_len(first: u8) -> usize {
    1 << (first >> 6)
}

/// Return the shortest variable-length integer encoding of `n`.
pub fn encode_varint_len(n: u64) -> usize {
    match n {
        0..=63 => 1,
        64..=16_383 => 2,
        16_384..=1_073_741_823 => 4,
        _ => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;

    use proptest::prelude::*;

    #[test]
    fn codec_uint() -> Result<()> {
        let mut buf = [0_u8; 4];

        let mut bw = &mut buf[..];
        let mut len = bw.write_u8(0x01)?;
        len += bw.write_u16(0x0203)?;
        assert_eq!(len, 3);
        assert_eq!(buf[..len], [0x01, 0x02, 0x03]);

        let mut br = &buf[..];
        assert_eq!(br.read_u8()?, 0x01);
        assert_eq!(br.read_u16()?, 0x0203);
        Ok(())
    }

    #[test]
    fn codec_varint() -> Result<()> {
        let mut buf = [0_u8; 8];
        let data = [
            (
                151_288_809_941_952_652,
                vec![0xc2_u8, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c],
            ),
            (494_878_333, vec![0x9d_u8, 0x7f, 0x3e, 0x7d]),
            (15_293, vec![0x7b_u8, 0xbd]),
            (37, vec![0x25_u8]),
        ];

        for (n, b) in data.iter() {
            let mut br = &b[..];
            assert_eq!(br.read_varint()?, *n);

            let mut bw = &mut buf[..];
            let len = bw.write_varint(*n)?;
            assert_eq!(buf[..len], b[..]);
        }
        Ok(())
    }

    #[test]
    fn codec_varint_boundary() -> Result<()> {
        // Each encoding length class, first and last representable value.
        let data = [
            (0, 1),
            (63, 1),
            (64, 2),
            (16383, 2),
            (16384, 4),
            ((1 << 30) - 1, 4),
            (1 << 30, 8),
            (VINT_MAX, 8),
        ];

        let mut buf = [0_u8; 8];
        for (n, enc_len) in data.iter() {
            assert_eq!(encode_varint_len(*n), *enc_len);

            let mut bw = &mut buf[..];
            let len = bw.write_varint(*n)?;
            assert_eq!(len, *enc_len);

            let mut br = &buf[..];
            assert_eq!(br.read_varint()?, *n);
        }
        Ok(())
    }

    #[test]
    fn varint_too_large() {
        let mut buf = [0_u8; 8];
        let mut bw = &mut buf[..];
        assert_eq!(bw.write_varint(VINT_MAX + 1), Err(Error::MalformedFrame));
    }

    #[test]
    fn codec_bytes() -> Result<()> {
        let mut buf = [0_u8; 8];
        let data = [0x01_u8, 0x02, 0x03, 0x04, 0x05, 0x06];

        let mut bw = &mut buf[..];
        let len = bw.write(&data[..])?;

        let mut br = &buf[..];
        assert_eq!(br.read(len)?[..], data[..]);
        Ok(())
    }

    #[test]
    fn codec_varint_length_prefix() -> Result<()> {
        let buf = [0x03_u8, 0x0a, 0x0b, 0x0c, 0xff];

        let mut br = &buf[..];
        assert_eq!(br.read_with_varint_length()?, vec![0x0a, 0x0b, 0x0c]);
        assert_eq!(br.len(), 1);

        // Declared length exceeds the remaining input.
        let bad = [0x04_u8, 0x0a, 0x0b];
        let mut br = &bad[..];
        assert_eq!(br.read_with_varint_length(), Err(Error::MalformedFrame));
        Ok(())
    }

    #[test]
    fn buffer_too_short() {
        let mut buf = [255; 16];
        let mut br = &buf[0..0];
        assert!(br.read_u8().is_err());
        assert!(br.read_u16().is_err());
        assert!(br.read_varint().is_err());
        assert!(br.read(1).is_err());
        assert!(br.skip(1).is_err());
        let mut br = &buf[0..1];
        assert!(br.read_varint().is_err());

        let mut bw = &mut buf[0..0];
        assert!(bw.write_u8(1).is_err());
        assert!(bw.write_u16(1).is_err());
        assert!(bw.write_varint(1).is_err());
        let data = [1; 10];
        assert!(bw.write(&data[..]).is_err());
    }

    proptest! {
        #[test]
        fn varint_roundtrip(n in 0..=VINT_MAX) {
            let mut buf = [0_u8; 8];
            let mut bw = &mut buf[..];
            let len = bw.write_varint(n).unwrap();
            prop_assert_eq!(len, encode_varint_len(n));

            let mut br = &buf[..len];
            prop_assert_eq!(br.read_varint().unwrap(), n);
            prop_assert!(br.is_empty());
        }

        #[test]
        fn varint_truncated(n in 64..=VINT_MAX) {
            let mut buf = [0_u8; 8];
            let mut bw = &mut buf[..];
            let len = bw.write_varint(n).unwrap();

            // Every strict prefix of a multi-byte varint is rejected.
            for cut in 0..len {
                let mut br = &buf[..cut];
                prop_assert_eq!(br.read_varint(), Err(Error::MalformedFrame));
            }
        }
    }
}
