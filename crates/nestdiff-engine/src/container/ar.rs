//! Unix `ar` archives: static libraries and `.deb` packages.
//!
//! Both GNU and BSD member naming are understood. GNU archives store long
//! names in a `//` string table and reference them as `/<offset>`; BSD
//! archives prefix the member data with the name and mark it as `#1/<len>`.
//! Symbol tables (`/`, `/SYM64/`, `__.SYMDEF*`) are skipped: their content is
//! reported through the `nm -s` detail instead.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::Container;
use crate::artifact::{Artifact, ArtifactRef};
use crate::error::{EngineError, EngineResult};

const MAGIC: &[u8] = b"!<arch>\n";
const HEADER_LEN: usize = 60;
const HEADER_END: &[u8] = b"`\n";

/// One regular member of an archive.
#[derive(Clone, Debug)]
pub struct ArEntry {
    pub name: String,
    pub data: Arc<[u8]>,
}

/// An `ar` archive, parsed in full on first access.
#[derive(Debug)]
pub struct ArContainer {
    source: ArtifactRef,
    entries: OnceLock<Vec<ArEntry>>,
}

impl ArContainer {
    pub fn new(source: ArtifactRef) -> Self {
        Self {
            source,
            entries: OnceLock::new(),
        }
    }

    /// Regular members in archive order.
    pub fn entries(&self) -> EngineResult<&[ArEntry]> {
        if let Some(entries) = self.entries.get() {
            return Ok(entries);
        }
        let bytes = self.source.read_bytes()?;
        let parsed = parse_archive(&bytes)
            .map_err(|reason| EngineError::malformed(self.source.name(), reason))?;
        debug!(
            archive = self.source.name(),
            members = parsed.len(),
            "parsed ar archive"
        );
        Ok(self.entries.get_or_init(|| parsed))
    }
}

impl Container for ArContainer {
    fn source(&self) -> &ArtifactRef {
        &self.source
    }

    fn member_names(&self) -> EngineResult<Vec<String>> {
        Ok(self.entries()?.iter().map(|e| e.name.clone()).collect())
    }

    fn member(&self, name: &str) -> EngineResult<ArtifactRef> {
        self.entries()?
            .iter()
            .find(|e| e.name == name)
            .map(|e| Artifact::from_bytes(e.name.clone(), Arc::clone(&e.data)))
            .ok_or_else(|| EngineError::MemberNotFound {
                container: self.source.name().to_string(),
                name: name.to_string(),
            })
    }

    fn all_members(&self) -> EngineResult<Vec<(String, ArtifactRef)>> {
        Ok(self
            .entries()?
            .iter()
            .map(|e| {
                let member = Artifact::from_bytes(e.name.clone(), Arc::clone(&e.data));
                (e.name.clone(), member)
            })
            .collect())
    }
}

/// Split an archive into its regular members.
pub fn parse_archive(bytes: &[u8]) -> Result<Vec<ArEntry>, String> {
    if !bytes.starts_with(MAGIC) {
        return Err("missing !<arch> magic".into());
    }
    let mut pos = MAGIC.len();
    let mut long_names: Option<&[u8]> = None;
    let mut entries = Vec::new();

    while pos < bytes.len() {
        let offset = pos;
        let rest = &bytes[pos..];
        if rest.len() < HEADER_LEN {
            // Some writers leave a stray newline after the last member.
            if rest.iter().all(|&b| b == b'\n') {
                break;
            }
            return Err(format!("truncated member header at offset {pos}"));
        }
        let header = &rest[..HEADER_LEN];
        if &header[58..60] != HEADER_END {
            return Err(format!("bad header terminator at offset {pos}"));
        }
        let raw_name = String::from_utf8_lossy(&header[..16]).trim_end().to_string();
        let size = parse_decimal(&header[48..58])
            .ok_or_else(|| format!("invalid size field at offset {pos}"))?;
        let start = pos + HEADER_LEN;
        let end = start
            .checked_add(size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| format!("member at offset {pos} extends past end of archive"))?;
        let data = &bytes[start..end];
        pos = end + (size % 2);

        match raw_name.as_str() {
            "//" => {
                long_names = Some(data);
                continue;
            }
            "/" | "/SYM64/" => {
                debug!(member = raw_name.as_str(), "skipping archive symbol table");
                continue;
            }
            _ => {}
        }

        let (name, data) = resolve_name(&raw_name, data, long_names)
            .map_err(|reason| format!("{reason} (member at offset {offset})"))?;
        if name.starts_with("__.SYMDEF") {
            debug!(member = name.as_str(), "skipping archive symbol table");
            continue;
        }
        if name.is_empty() {
            return Err(format!("empty member name at offset {offset}"));
        }
        entries.push(ArEntry {
            name,
            data: Arc::from(data),
        });
    }
    Ok(entries)
}

fn resolve_name<'a>(
    raw: &str,
    data: &'a [u8],
    long_names: Option<&[u8]>,
) -> Result<(String, &'a [u8]), String> {
    if let Some(len) = raw.strip_prefix("#1/") {
        let len: usize = len
            .parse()
            .map_err(|_| format!("invalid BSD name length {len:?}"))?;
        if len > data.len() {
            return Err("BSD name longer than member data".into());
        }
        let (name, data) = data.split_at(len);
        let name = String::from_utf8_lossy(name)
            .trim_end_matches('\0')
            .to_string();
        return Ok((name, data));
    }

    if let Some(offset) = raw.strip_prefix('/') {
        if !offset.is_empty() && offset.bytes().all(|b| b.is_ascii_digit()) {
            let table = long_names.ok_or("long name reference without a // table")?;
            let offset: usize = offset
                .parse()
                .map_err(|_| format!("invalid long name offset {offset:?}"))?;
            let tail = table
                .get(offset..)
                .ok_or_else(|| format!("long name offset {offset} out of range"))?;
            let end = tail.iter().position(|&b| b == b'\n').unwrap_or(tail.len());
            let name = String::from_utf8_lossy(&tail[..end]);
            return Ok((name.trim_end_matches('/').to_string(), data));
        }
    }

    Ok((raw.strip_suffix('/').unwrap_or(raw).to_string(), data))
}

fn parse_decimal(field: &[u8]) -> Option<usize> {
    std::str::from_utf8(field).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ar_archive;

    fn header(name: &str, size: usize) -> Vec<u8> {
        format!("{name:<16}{:<12}{:<6}{:<6}{:<8}{size:<10}`\n", 0, 0, 0, 100644).into_bytes()
    }

    #[test]
    fn parses_gnu_short_names() {
        let bytes = ar_archive(&[("a.o", b"one"), ("b.o", b"two!")]);
        let entries = parse_archive(&bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.o");
        assert_eq!(&*entries[0].data, b"one");
        assert_eq!(entries[1].name, "b.o");
        assert_eq!(&*entries[1].data, b"two!");
    }

    #[test]
    fn resolves_gnu_long_names() {
        let table = b"a_rather_long_object_name.o/\n";
        let mut bytes = MAGIC.to_vec();
        bytes.extend(header("//", table.len()));
        bytes.extend_from_slice(table);
        bytes.push(b'\n');
        bytes.extend(header("/0", 2));
        bytes.extend_from_slice(b"hi");

        let entries = parse_archive(&bytes).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a_rather_long_object_name.o");
        assert_eq!(&*entries[0].data, b"hi");
    }

    #[test]
    fn resolves_bsd_names_and_skips_symdef() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend(header("#1/20", 24));
        bytes.extend_from_slice(b"__.SYMDEF SORTED\0\0\0\0");
        bytes.extend_from_slice(b"syms");
        bytes.extend(header("#1/12", 15));
        bytes.extend_from_slice(b"long_name.o\0");
        bytes.extend_from_slice(b"abc");
        bytes.push(b'\n');

        let entries = parse_archive(&bytes).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "long_name.o");
        assert_eq!(&*entries[0].data, b"abc");
    }

    #[test]
    fn skips_gnu_symbol_table() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend(header("/", 4));
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend(ar_archive(&[("x.o", b"x")])[MAGIC.len()..].iter().copied());

        let entries = parse_archive(&bytes).unwrap();
        assert_eq!(entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["x.o"]);
    }

    #[test]
    fn rejects_corrupt_archives() {
        assert!(parse_archive(b"not an archive").is_err());

        let mut truncated = ar_archive(&[("a.o", b"0123456789")]);
        truncated.truncate(truncated.len() - 4);
        assert!(parse_archive(&truncated).unwrap_err().contains("past end"));

        let mut bad_size = MAGIC.to_vec();
        bad_size.extend(header("a.o/", 0));
        bad_size[MAGIC.len() + 48] = b'x';
        assert!(parse_archive(&bad_size).unwrap_err().contains("size"));

        let mut dangling = MAGIC.to_vec();
        dangling.extend(header("/4", 0));
        assert!(parse_archive(&dangling).unwrap_err().contains("//"));
    }

    #[test]
    fn container_exposes_members_in_order() {
        let source = Artifact::from_bytes(
            "lib.a",
            ar_archive(&[("z.o", b"z"), ("a.o", b"a"), ("z.o", b"dup")]),
        );
        let container = ArContainer::new(source);
        assert_eq!(container.member_names().unwrap(), vec!["z.o", "a.o", "z.o"]);

        let members = container.members().unwrap();
        assert_eq!(members.keys().collect::<Vec<_>>(), vec!["z.o", "a.o"]);
        assert_eq!(&*members["z.o"].read_bytes().unwrap(), b"z");
        assert_eq!(&*container.member("z.o").unwrap().read_bytes().unwrap(), b"z");
    }

    #[test]
    fn malformed_archive_surfaces_as_engine_error() {
        let container = ArContainer::new(Artifact::from_bytes("bad.a", b"!<arch>\nshort".to_vec()));
        assert!(matches!(
            container.member_names(),
            Err(EngineError::MalformedContainer { .. })
        ));
    }
}
