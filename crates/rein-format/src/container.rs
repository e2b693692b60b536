//! Whole-container framing: header, section-info table, sections.
//!
//! ```text
//! [0, 4096)      header — ASCII tag, version string at offset 62
//! [4096, 8192)   section-info table
//! [8192, ...)    session section, then a graph section or an opaque
//!                precompiled blob, both page-aligned
//! ```
//!
//! Section-info table layout:
//!
//! ```text
//! 0   section_info_size  u32  (bytes, 4096 when zero)
//! 4   section_count      u32
//! 8   descriptors        16 bytes each:
//!     { info_offset u32 (pages), graph_offset u32 (pages),
//!       graph_size u32 (bytes), reserved u32 }
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use rein_core::{ModelRef, RunMode, Session, SharedBytes};

use crate::error::{FormatError, Result};
use crate::graph::{dump_graph, load_graph};
use crate::offset::pointer_width_check;
use crate::session::{dump_session, load_session};
use crate::tensor::BlobSource;
use crate::version::{check_version, write_header, FormatVersion, HEADER_SIZE, PAGE_SIZE};
use crate::wire::{BlockReader, BlockWriter};

/// Default size of the section-info table.
pub const SECTION_INFO_SIZE: usize = 4096;

/// One section descriptor: where the session and model sections live.
#[derive(Debug, Clone, Copy)]
struct SectionEntry {
    /// Session section offset, in pages.
    info_offset: u32,
    /// Model (graph or blob) section offset, in pages.
    graph_offset: u32,
    /// Model section size, in bytes.
    graph_size: u32,
}

fn pad_to_page(buf: &mut Vec<u8>) {
    let len = buf.len().div_ceil(PAGE_SIZE) * PAGE_SIZE;
    buf.resize(len, 0);
}

/// Serialize a complete session into a self-contained container blob.
///
/// The model section is chosen by the session's run mode: a live graph is
/// dumped as an interpretable section, a precompiled blob is copied through
/// verbatim. A session with no model cannot be dumped.
pub fn dump(session: &Session) -> Result<Vec<u8>> {
    pointer_width_check()?;

    let session_block = dump_session(session)?;
    let model_block: Vec<u8> = match (&session.model, session.run_mode) {
        (ModelRef::Graph(graph), RunMode::Graph) => dump_graph(graph)?,
        (ModelRef::Blob(blob), RunMode::Compiled) => blob.as_slice().to_vec(),
        (ModelRef::Graph(_), RunMode::Compiled) | (ModelRef::Blob(_), RunMode::Graph) => {
            return Err(FormatError::Malformed(
                "session run mode does not match its model reference".into(),
            ))
        }
        (ModelRef::None, _) => {
            return Err(FormatError::Malformed("session has no model to dump".into()))
        }
    };

    let session_pages = session_block.len().div_ceil(PAGE_SIZE) as u32;
    let entry = SectionEntry {
        info_offset: 2,
        graph_offset: 2 + session_pages,
        graph_size: model_block.len() as u32,
    };

    let mut out = write_header();
    debug_assert_eq!(out.len(), HEADER_SIZE);

    let mut info = BlockWriter::with_capacity(SECTION_INFO_SIZE);
    info.put_u32(SECTION_INFO_SIZE as u32);
    info.put_u32(1);
    info.put_u32(entry.info_offset);
    info.put_u32(entry.graph_offset);
    info.put_u32(entry.graph_size);
    info.put_u32(0);
    let mut info = info.into_vec();
    info.resize(SECTION_INFO_SIZE, 0);
    out.extend_from_slice(&info);

    out.extend_from_slice(&session_block);
    pad_to_page(&mut out);
    out.extend_from_slice(&model_block);

    info!(
        bytes = out.len(),
        session_bytes = session_block.len(),
        model_bytes = model_block.len(),
        "dumped binary model"
    );
    Ok(out)
}

/// Reconstruct a runnable session from a container blob.
///
/// The blob is shared so constant tensor payloads can alias it zero-copy;
/// everything else in the returned session is freshly owned. Backend
/// kernels are not attached here — run the session through the provider
/// registry afterwards.
pub fn import(blob: Arc<[u8]>) -> Result<Session> {
    pointer_width_check()?;

    let bytes: &[u8] = &blob;
    let version = check_version(bytes)?;

    if bytes.len() < HEADER_SIZE + SECTION_INFO_SIZE {
        return Err(FormatError::Truncated {
            at: HEADER_SIZE,
            need: SECTION_INFO_SIZE,
            have: bytes.len().saturating_sub(HEADER_SIZE),
        });
    }
    let mut info = BlockReader::new(&bytes[HEADER_SIZE..HEADER_SIZE + SECTION_INFO_SIZE]);
    let _section_info_size = match info.get_u32()? {
        0 => SECTION_INFO_SIZE as u32,
        n => n,
    };
    let section_count = info.get_u32()?;
    if section_count == 0 {
        return Err(FormatError::Malformed("container declares no sections".into()));
    }
    let entry = SectionEntry {
        info_offset: info.get_u32()?,
        graph_offset: info.get_u32()?,
        graph_size: info.get_u32()?,
    };
    debug!(
        %version,
        sections = section_count,
        session_page = entry.info_offset,
        model_page = entry.graph_offset,
        model_bytes = entry.graph_size,
        "importing binary model"
    );

    let session_start = entry.info_offset as usize * PAGE_SIZE;
    if session_start >= bytes.len() {
        return Err(FormatError::Malformed(format!(
            "session section page {} is outside the container",
            entry.info_offset
        )));
    }
    let session_block = &bytes[session_start..];
    let mut session = load_session(
        session_block,
        &BlobSource::Shared {
            blob: blob.clone(),
            base: session_start,
        },
    )?;

    let model_start = entry.graph_offset as usize * PAGE_SIZE;
    let model_size = entry.graph_size as usize;
    if model_start + model_size > bytes.len() {
        return Err(FormatError::Truncated {
            at: model_start,
            need: model_size,
            have: bytes.len().saturating_sub(model_start),
        });
    }

    // Version 1.x containers predate the interpretable graph section; their
    // trailing section is always an opaque backend blob.
    let legacy = version < FormatVersion { major: 2, minor: 0 };
    session.model = if session.run_mode == RunMode::Graph && !legacy {
        let section = &bytes[model_start..model_start + model_size];
        ModelRef::Graph(load_graph(
            section,
            &BlobSource::Shared {
                blob: blob.clone(),
                base: model_start,
            },
        )?)
    } else {
        ModelRef::Blob(SharedBytes::new(blob.clone(), model_start, model_size))
    };

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{HEADER_TAG, VERSION_OFFSET};
    use rein_core::{DataType, Tensor};

    fn blob_session() -> Session {
        let mut session = Session::new().with_run_mode(RunMode::Compiled);
        session.inputs = vec![Tensor::new("in", DataType::Float32, vec![1, 4]).unwrap()];
        session.model = ModelRef::Blob(SharedBytes::from_vec(vec![0xAB; 100]));
        session
    }

    #[test]
    fn compiled_blob_passes_through_verbatim() {
        let container = dump(&blob_session()).unwrap();
        let loaded = import(Arc::from(container)).unwrap();
        match &loaded.model {
            ModelRef::Blob(b) => assert_eq!(b.as_slice(), &[0xAB; 100][..]),
            other => panic!("expected blob model, got {other:?}"),
        }
    }

    #[test]
    fn missing_model_is_a_dump_error() {
        let session = Session::new();
        assert!(matches!(dump(&session), Err(FormatError::Malformed(_))));
    }

    #[test]
    fn legacy_container_takes_the_blob_path() {
        let mut container = dump(&blob_session()).unwrap();
        // Rewrite the header version to the legacy major.
        container[VERSION_OFFSET..VERSION_OFFSET + 4].copy_from_slice(b"1.0\n");
        let loaded = import(Arc::from(container)).unwrap();
        assert!(matches!(loaded.model, ModelRef::Blob(_)));
    }

    #[test]
    fn truncated_container_is_rejected() {
        let container = dump(&blob_session()).unwrap();
        let truncated: Arc<[u8]> = Arc::from(&container[..HEADER_SIZE + 16]);
        assert!(import(truncated).is_err());
    }

    #[test]
    fn header_tag_is_fixed() {
        let container = dump(&blob_session()).unwrap();
        assert_eq!(&container[..HEADER_TAG.len()], HEADER_TAG);
    }
}
