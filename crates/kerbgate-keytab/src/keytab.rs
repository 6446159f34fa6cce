//! Keytab model and MIT file format codec.
//!
//! The on-disk layout (as written by `ktutil` and `kadmin`):
//!
//! ```text
//! keytab  := 0x05 version record*
//! record  := length:i32 ( entry | hole )      ; negative length = hole
//! entry   := count:u16 realm component{count}
//!            name_type:u32 (v2 only) timestamp:u32 kvno8:u8
//!            enctype:u16 key [kvno32:u32]
//! data    := length:u16 bytes
//! ```
//!
//! Version `0x02` is big-endian. Version `0x01` uses the writer's native byte
//! order and counts the realm in `count`. Only version `0x02` is written.

use crate::error::{KeytabError, KeytabResult};
use crate::principal::{name_type, Principal};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::path::Path;

/// First byte of every keytab file.
pub const FORMAT_MAGIC: u8 = 0x05;

/// Common encryption type numbers (RFC 3961, RFC 8009).
pub mod enctype {
    /// `des3-cbc-sha1-kd`
    pub const DES3_CBC_SHA1_KD: u16 = 16;
    /// `aes128-cts-hmac-sha1-96`
    pub const AES128_CTS_HMAC_SHA1_96: u16 = 17;
    /// `aes256-cts-hmac-sha1-96`
    pub const AES256_CTS_HMAC_SHA1_96: u16 = 18;
    /// `aes128-cts-hmac-sha256-128`
    pub const AES128_CTS_HMAC_SHA256_128: u16 = 19;
    /// `aes256-cts-hmac-sha384-192`
    pub const AES256_CTS_HMAC_SHA384_192: u16 = 20;
    /// `rc4-hmac`
    pub const RC4_HMAC: u16 = 23;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    V1,
    V2,
}

/// A long-term key. The key bytes are never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    enctype: u16,
    contents: Bytes,
}

impl EncryptionKey {
    /// Creates a key of the given encryption type.
    pub fn new(enctype: u16, contents: impl Into<Bytes>) -> Self {
        Self {
            enctype,
            contents: contents.into(),
        }
    }

    /// Returns the encryption type number.
    pub fn enctype(&self) -> u16 {
        self.enctype
    }

    /// Returns the raw key bytes.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("enctype", &self.enctype)
            .field("contents", &format_args!("<{} bytes>", self.contents.len()))
            .finish()
    }
}

/// One principal/key-version/encryption-type entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeytabEntry {
    /// The service principal the key belongs to.
    pub principal: Principal,
    /// Seconds since the Unix epoch when the key was written.
    pub timestamp: u32,
    /// Key version number.
    pub kvno: u32,
    /// The key itself.
    pub key: EncryptionKey,
}

impl KeytabEntry {
    /// Creates an entry.
    pub fn new(principal: Principal, timestamp: u32, kvno: u32, key: EncryptionKey) -> Self {
        Self {
            principal,
            timestamp,
            kvno,
            key,
        }
    }
}

/// A set of service keys, as loaded from one or more keytab files.
///
/// # Example
///
/// ```
/// use kerbgate_keytab::{enctype, EncryptionKey, Keytab, KeytabEntry, Principal};
///
/// let mut keytab = Keytab::new();
/// keytab.add_entry(KeytabEntry::new(
///     Principal::new("HTTP/sso.example.com", "EXAMPLE.COM"),
///     1_700_000_000,
///     2,
///     EncryptionKey::new(enctype::AES256_CTS_HMAC_SHA1_96, vec![0u8; 32]),
/// ));
///
/// let bytes = keytab.to_bytes().unwrap();
/// let parsed = Keytab::parse(&bytes).unwrap();
/// assert_eq!(parsed, keytab);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keytab {
    entries: Vec<KeytabEntry>,
}

impl Keytab {
    /// Creates an empty keytab.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all entries in file order.
    pub fn entries(&self) -> &[KeytabEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the keytab has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry.
    pub fn add_entry(&mut self, entry: KeytabEntry) {
        self.entries.push(entry);
    }

    /// Appends every entry of `other`, keeping order.
    pub fn merge(&mut self, other: Keytab) {
        self.entries.extend(other.entries);
    }

    /// Finds the key for a principal and encryption type.
    ///
    /// With `kvno = None` the entry with the highest key version wins.
    pub fn find_key(&self, principal: &Principal, kvno: Option<u32>, enctype: u16) -> Option<&EncryptionKey> {
        self.entries
            .iter()
            .filter(|e| e.principal.matches(principal) && e.key.enctype == enctype)
            .filter(|e| kvno.map_or(true, |v| e.kvno == v))
            .max_by_key(|e| e.kvno)
            .map(|e| &e.key)
    }

    /// Iterates the distinct principals, in first-seen order.
    pub fn principals(&self) -> impl Iterator<Item = &Principal> {
        let mut seen: Vec<&Principal> = Vec::new();
        self.entries.iter().filter_map(move |e| {
            if seen.iter().any(|p| p.matches(&e.principal)) {
                None
            } else {
                seen.push(&e.principal);
                Some(&e.principal)
            }
        })
    }

    /// Reads and parses a keytab file.
    pub fn from_file(path: impl AsRef<Path>) -> KeytabResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| KeytabError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&data)
    }

    /// Writes the keytab to a file in version `0x02` format.
    pub fn write_file(&self, path: impl AsRef<Path>) -> KeytabResult<()> {
        let path = path.as_ref();
        let data = self.to_bytes()?;
        std::fs::write(path, &data).map_err(|source| KeytabError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses keytab bytes.
    pub fn parse(data: &[u8]) -> KeytabResult<Self> {
        let mut buf = data;
        if buf.remaining() < 2 {
            return Err(KeytabError::Truncated("header"));
        }
        let (magic, version) = (buf.get_u8(), buf.get_u8());
        let format = match (magic, version) {
            (FORMAT_MAGIC, 0x01) => Format::V1,
            (FORMAT_MAGIC, 0x02) => Format::V2,
            _ => return Err(KeytabError::InvalidHeader(magic, version)),
        };

        let mut entries = Vec::new();
        while buf.has_remaining() {
            if buf.remaining() < 4 {
                return Err(KeytabError::Truncated("record length"));
            }
            let size = match format {
                Format::V1 => buf.get_i32_ne(),
                Format::V2 => buf.get_i32(),
            };
            // A zero length marks the end of the written records
            if size == 0 {
                break;
            }
            let len = size.unsigned_abs() as usize;
            if buf.remaining() < len {
                return Err(KeytabError::Truncated("record"));
            }
            let (record, rest) = buf.split_at(len);
            buf = rest;

            if size < 0 {
                tracing::trace!(len, "skipping keytab hole");
                continue;
            }
            let entry = decode_entry(record, format).map_err(|reason| KeytabError::InvalidEntry {
                index: entries.len(),
                reason,
            })?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Encodes the keytab in version `0x02` format.
    pub fn to_bytes(&self) -> KeytabResult<Bytes> {
        let mut out = BytesMut::new();
        out.put_u8(FORMAT_MAGIC);
        out.put_u8(0x02);
        for entry in &self.entries {
            let record = encode_entry(entry)?;
            let len = i32::try_from(record.len()).map_err(|_| KeytabError::TooLarge("entry"))?;
            out.put_i32(len);
            out.put_slice(&record);
        }
        Ok(out.freeze())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    format: Format,
}

impl<'a> Reader<'a> {
    fn need(&self, n: usize, what: &str) -> Result<(), String> {
        if self.buf.remaining() < n {
            return Err(format!("truncated {what}"));
        }
        Ok(())
    }

    fn u8(&mut self, what: &str) -> Result<u8, String> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self, what: &str) -> Result<u16, String> {
        self.need(2, what)?;
        Ok(match self.format {
            Format::V1 => self.buf.get_u16_ne(),
            Format::V2 => self.buf.get_u16(),
        })
    }

    fn u32(&mut self, what: &str) -> Result<u32, String> {
        self.need(4, what)?;
        Ok(match self.format {
            Format::V1 => self.buf.get_u32_ne(),
            Format::V2 => self.buf.get_u32(),
        })
    }

    fn data(&mut self, what: &str) -> Result<&'a [u8], String> {
        let len = usize::from(self.u16(what)?);
        self.need(len, what)?;
        let (data, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(data)
    }

    fn string(&mut self, what: &str) -> Result<String, String> {
        let data = self.data(what)?;
        String::from_utf8(data.to_vec()).map_err(|_| format!("{what} is not valid UTF-8"))
    }
}

fn decode_entry(record: &[u8], format: Format) -> Result<KeytabEntry, String> {
    let mut r = Reader { buf: record, format };

    let mut count = r.u16("component count")?;
    if format == Format::V1 {
        count = count
            .checked_sub(1)
            .ok_or_else(|| "component count is zero".to_string())?;
    }
    let realm = r.string("realm")?;
    let components = (0..count)
        .map(|_| r.string("name component"))
        .collect::<Result<Vec<_>, _>>()?;
    let name_type = match format {
        Format::V1 => name_type::PRINCIPAL,
        Format::V2 => r.u32("name type")?,
    };
    let timestamp = r.u32("timestamp")?;
    let kvno8 = r.u8("key version")?;
    let enctype = r.u16("encryption type")?;
    let contents = Bytes::copy_from_slice(r.data("key")?);

    // Newer writers append the full 32-bit key version; zero means unset
    let mut kvno = u32::from(kvno8);
    if r.buf.remaining() >= 4 {
        let kvno32 = r.u32("key version")?;
        if kvno32 != 0 {
            kvno = kvno32;
        }
    }

    Ok(KeytabEntry {
        principal: Principal::from_components(components, realm, name_type),
        timestamp,
        kvno,
        key: EncryptionKey { enctype, contents },
    })
}

fn put_data(out: &mut BytesMut, data: &[u8], what: &'static str) -> KeytabResult<()> {
    let len = u16::try_from(data.len()).map_err(|_| KeytabError::TooLarge(what))?;
    out.put_u16(len);
    out.put_slice(data);
    Ok(())
}

fn encode_entry(entry: &KeytabEntry) -> KeytabResult<BytesMut> {
    let principal = &entry.principal;
    let count = u16::try_from(principal.components().len())
        .map_err(|_| KeytabError::TooLarge("principal component count"))?;

    let mut out = BytesMut::new();
    out.put_u16(count);
    put_data(&mut out, principal.realm().as_bytes(), "realm")?;
    for component in principal.components() {
        put_data(&mut out, component.as_bytes(), "principal component")?;
    }
    out.put_u32(principal.name_type());
    out.put_u32(entry.timestamp);
    out.put_u8((entry.kvno & 0xff) as u8);
    out.put_u16(entry.key.enctype);
    put_data(&mut out, &entry.key.contents, "key")?;
    out.put_u32(entry.kvno);
    Ok(out)
}
