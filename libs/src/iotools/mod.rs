use crate::group_structures::ScalarField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, SerializationError, Validate};
use blake2::{Blake2b512, Digest};
use byteorder::{BigEndian, NativeEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// First bytes of a fast dump. Never a valid encoding tag.
pub const DUMP_MARKER: [u8; 8] = *b"\xd7G16DUMP";

/// Upper bound on preallocation when decoding a length prefix.
const MAX_PREALLOC: usize = 1 << 16;

#[macro_export]
macro_rules! impl_read_from_json {
    ($t:ty) => {
        impl $t {
            pub fn read_from_json<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Self> {
                use serde_json::from_reader;
                use std::fs::File;
                use std::io::BufReader;
                let file = File::open(path)?;
                let reader = BufReader::new(file);
                let res: Self = from_reader(reader)?;
                Ok(res)
            }
        }
    };
}

#[macro_export]
macro_rules! impl_write_into_json {
    ($t:ty) => {
        impl $t {
            pub fn write_into_json<P: AsRef<std::path::Path>>(&self, path: P) -> std::io::Result<()> {
                use serde_json::to_writer_pretty;
                use std::fs::{self, File};
                use std::io::{BufWriter, Write};
                if let Some(parent) = path.as_ref().parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                let file = File::create(path)?;
                let mut writer = BufWriter::new(file);
                to_writer_pretty(&mut writer, self)?;
                writer.flush()?;
                Ok(())
            }
        }
    };
}

/// How group elements are laid out in a binary stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointEncoding {
    /// x coordinate plus flag bits.
    Compressed,
    /// Both coordinates, big-endian lengths.
    Raw,
    /// Both coordinates, native-endian lengths, no validation on read.
    Dump,
}

impl PointEncoding {
    fn tag(self) -> u8 {
        match self {
            PointEncoding::Compressed => 0x01,
            PointEncoding::Raw => 0x02,
            PointEncoding::Dump => DUMP_MARKER[0],
        }
    }

    fn from_tag(tag: u8) -> io::Result<Self> {
        match tag {
            0x01 => Ok(PointEncoding::Compressed),
            0x02 => Ok(PointEncoding::Raw),
            _ => Err(invalid_data(format!("unknown point encoding tag 0x{tag:02x}"))),
        }
    }

    pub fn compress(self) -> Compress {
        match self {
            PointEncoding::Compressed => Compress::Yes,
            PointEncoding::Raw | PointEncoding::Dump => Compress::No,
        }
    }
}

pub fn invalid_data<E: ToString>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

fn from_serialization_error(e: SerializationError) -> io::Error {
    match e {
        SerializationError::IoError(e) => e,
        other => invalid_data(other),
    }
}

/// Length-prefixed binary writer for curve points and bookkeeping integers.
pub struct Encoder<W> {
    writer: W,
    encoding: PointEncoding,
    written: u64,
}

impl<W: Write> Encoder<W> {
    /// An encoder that writes no header. Used for hashing.
    pub fn new(writer: W, encoding: PointEncoding) -> Self {
        Self {
            writer,
            encoding,
            written: 0,
        }
    }

    /// An encoder that first writes the encoding tag (or the dump marker).
    pub fn with_header(writer: W, encoding: PointEncoding) -> io::Result<Self> {
        let mut enc = Self::new(writer, encoding);
        match encoding {
            PointEncoding::Dump => enc.write_bytes(&DUMP_MARKER)?,
            _ => enc.write_u8(encoding.tag())?,
        }
        Ok(enc)
    }

    pub fn encoding(&self) -> PointEncoding {
        self.encoding
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> io::Result<()> {
        self.writer.write_u8(v)?;
        self.written += 1;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> io::Result<()> {
        match self.encoding {
            PointEncoding::Dump => self.writer.write_u32::<NativeEndian>(v)?,
            _ => self.writer.write_u32::<BigEndian>(v)?,
        }
        self.written += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> io::Result<()> {
        match self.encoding {
            PointEncoding::Dump => self.writer.write_u64::<NativeEndian>(v)?,
            _ => self.writer.write_u64::<BigEndian>(v)?,
        }
        self.written += 8;
        Ok(())
    }

    pub fn write_len(&mut self, len: usize) -> io::Result<()> {
        let len = u32::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "sequence longer than u32::MAX")
        })?;
        self.write_u32(len)
    }

    pub fn write_point<P: CanonicalSerialize>(&mut self, p: &P) -> io::Result<()> {
        let compress = self.encoding.compress();
        p.serialize_with_mode(&mut self.writer, compress)
            .map_err(from_serialization_error)?;
        self.written += p.serialized_size(compress) as u64;
        Ok(())
    }

    pub fn write_points<P: CanonicalSerialize>(&mut self, points: &[P]) -> io::Result<()> {
        self.write_len(points.len())?;
        for p in points {
            self.write_point(p)?;
        }
        Ok(())
    }

    pub fn write_nested_points<P: CanonicalSerialize>(&mut self, points: &[Vec<P>]) -> io::Result<()> {
        self.write_len(points.len())?;
        for inner in points {
            self.write_points(inner)?;
        }
        Ok(())
    }

    pub fn write_scalar(&mut self, s: &ScalarField) -> io::Result<()> {
        s.serialize_with_mode(&mut self.writer, Compress::No)
            .map_err(from_serialization_error)?;
        self.written += s.serialized_size(Compress::No) as u64;
        Ok(())
    }

    pub fn write_bools(&mut self, flags: &[bool]) -> io::Result<()> {
        self.write_len(flags.len())?;
        let bytes: Vec<u8> = flags.iter().map(|&b| b as u8).collect();
        self.write_bytes(&bytes)
    }

    pub fn write_u64_vecs(&mut self, values: &[Vec<u64>]) -> io::Result<()> {
        self.write_len(values.len())?;
        for inner in values {
            self.write_len(inner.len())?;
            for &v in inner {
                self.write_u64(v)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Reader counterpart of [`Encoder`].
pub struct Decoder<R> {
    reader: R,
    encoding: PointEncoding,
    validate: Validate,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R, encoding: PointEncoding, subgroup_checks: bool) -> Self {
        let validate = match (encoding, subgroup_checks) {
            (PointEncoding::Dump, _) | (_, false) => Validate::No,
            _ => Validate::Yes,
        };
        Self {
            reader,
            encoding,
            validate,
        }
    }

    /// Reads the tag byte and picks compressed or raw accordingly.
    pub fn with_header(mut reader: R, subgroup_checks: bool) -> io::Result<Self> {
        let tag = reader.read_u8()?;
        if tag == DUMP_MARKER[0] {
            return Err(invalid_data("fast dump streams must be read with read_dump"));
        }
        let encoding = PointEncoding::from_tag(tag)?;
        Ok(Self::new(reader, encoding, subgroup_checks))
    }

    /// Checks the dump marker and returns an unvalidated raw decoder.
    pub fn dump(mut reader: R) -> io::Result<Self> {
        let mut marker = [0u8; 8];
        reader.read_exact(&mut marker)?;
        if marker != DUMP_MARKER {
            return Err(invalid_data("missing fast dump marker"));
        }
        Ok(Self::new(reader, PointEncoding::Dump, false))
    }

    pub fn encoding(&self) -> PointEncoding {
        self.encoding
    }

    pub fn read_bytes<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.reader.read_u8()
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        match self.encoding {
            PointEncoding::Dump => self.reader.read_u32::<NativeEndian>(),
            _ => self.reader.read_u32::<BigEndian>(),
        }
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        match self.encoding {
            PointEncoding::Dump => self.reader.read_u64::<NativeEndian>(),
            _ => self.reader.read_u64::<BigEndian>(),
        }
    }

    pub fn read_len(&mut self) -> io::Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    pub fn read_point<P: CanonicalDeserialize>(&mut self) -> io::Result<P> {
        P::deserialize_with_mode(&mut self.reader, self.encoding.compress(), self.validate)
            .map_err(from_serialization_error)
    }

    pub fn read_points<P: CanonicalDeserialize>(&mut self) -> io::Result<Vec<P>> {
        let len = self.read_len()?;
        let mut points = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            points.push(self.read_point()?);
        }
        Ok(points)
    }

    pub fn read_nested_points<P: CanonicalDeserialize>(&mut self) -> io::Result<Vec<Vec<P>>> {
        let len = self.read_len()?;
        let mut points = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            points.push(self.read_points()?);
        }
        Ok(points)
    }

    pub fn read_scalar(&mut self) -> io::Result<ScalarField> {
        ScalarField::deserialize_with_mode(&mut self.reader, Compress::No, Validate::Yes)
            .map_err(from_serialization_error)
    }

    pub fn read_bools(&mut self) -> io::Result<Vec<bool>> {
        let len = self.read_len()?;
        let mut flags = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            match self.reader.read_u8()? {
                0 => flags.push(false),
                1 => flags.push(true),
                b => return Err(invalid_data(format!("invalid boolean byte 0x{b:02x}"))),
            }
        }
        Ok(flags)
    }

    pub fn read_u64_vecs(&mut self) -> io::Result<Vec<Vec<u64>>> {
        let len = self.read_len()?;
        let mut values = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            let inner_len = self.read_len()?;
            let mut inner = Vec::with_capacity(inner_len.min(MAX_PREALLOC));
            for _ in 0..inner_len {
                inner.push(self.read_u64()?);
            }
            values.push(inner);
        }
        Ok(values)
    }

    /// Fails unless the stream has been fully consumed.
    pub fn finish(mut self) -> io::Result<()> {
        let mut probe = [0u8; 1];
        match self.reader.read(&mut probe)? {
            0 => Ok(()),
            _ => Err(invalid_data("trailing bytes after encoded value")),
        }
    }
}

/// `io::Write` sink that feeds a Blake2b-512 hasher.
#[derive(Default, Clone)]
pub struct Blake2bWriter(Blake2b512);

impl Blake2bWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finalize(self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out.copy_from_slice(&self.0.finalize());
        out
    }
}

impl Write for Blake2bWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group_structures::{g1_generator, g2_generator, G1Affine, G2Affine};
    use ark_ec::AffineRepr;

    fn sample_points() -> (Vec<G1Affine>, Vec<G2Affine>) {
        let g1 = vec![g1_generator(), G1Affine::zero(), (g1_generator() * ScalarField::from(5u64)).into()];
        let g2 = vec![G2Affine::zero(), g2_generator()];
        (g1, g2)
    }

    #[test]
    fn test_header_selects_encoding() {
        let (g1, g2) = sample_points();
        for encoding in [PointEncoding::Compressed, PointEncoding::Raw] {
            let mut enc = Encoder::with_header(Vec::new(), encoding).unwrap();
            enc.write_points(&g1).unwrap();
            enc.write_points(&g2).unwrap();
            enc.write_bools(&[true, false]).unwrap();
            let written = enc.bytes_written();
            let bytes = enc.into_inner();
            assert_eq!(written as usize, bytes.len());

            let mut dec = Decoder::with_header(bytes.as_slice(), true).unwrap();
            assert_eq!(dec.encoding(), encoding);
            assert_eq!(dec.read_points::<G1Affine>().unwrap(), g1);
            assert_eq!(dec.read_points::<G2Affine>().unwrap(), g2);
            assert_eq!(dec.read_bools().unwrap(), vec![true, false]);
            dec.finish().unwrap();
        }
    }

    #[test]
    fn test_lengths_are_big_endian() {
        let mut enc = Encoder::new(Vec::new(), PointEncoding::Compressed);
        enc.write_len(0x0102_0304).unwrap();
        assert_eq!(enc.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_dump_requires_marker() {
        let (g1, _) = sample_points();
        let mut enc = Encoder::with_header(Vec::new(), PointEncoding::Dump).unwrap();
        enc.write_points(&g1).unwrap();
        let bytes = enc.into_inner();

        assert!(Decoder::with_header(bytes.as_slice(), true).is_err());
        let mut dec = Decoder::dump(bytes.as_slice()).unwrap();
        assert_eq!(dec.read_points::<G1Affine>().unwrap(), g1);

        let mut raw = Encoder::with_header(Vec::new(), PointEncoding::Raw).unwrap();
        raw.write_points(&g1).unwrap();
        assert!(Decoder::dump(raw.into_inner().as_slice()).is_err());
    }

    #[test]
    fn test_truncated_stream_fails() {
        let (g1, _) = sample_points();
        let mut enc = Encoder::with_header(Vec::new(), PointEncoding::Raw).unwrap();
        enc.write_points(&g1).unwrap();
        let bytes = enc.into_inner();
        let mut dec = Decoder::with_header(&bytes[..bytes.len() - 3], true).unwrap();
        assert!(dec.read_points::<G1Affine>().is_err());
    }

    #[test]
    fn test_blake2b_writer() {
        let mut w = Blake2bWriter::new();
        w.write_all(b"abc").unwrap();
        let expected = Blake2b512::digest(b"abc");
        assert_eq!(&w.finalize()[..], expected.as_slice());
    }
}
