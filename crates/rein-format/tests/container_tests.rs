//! Container framing tests: header bytes, version gate, disk round-trip.

use std::fs;
use std::sync::Arc;

use rein_core::{DataType, Graph, OpKind, OpParams, ParamsBlock, Session, Tensor};
use rein_format::{check_version, FormatVersion, HEADER_SIZE, PAGE_SIZE, SECTION_INFO_SIZE};

fn tiny_session() -> Session {
    let mut graph = Graph::new();
    let a = graph.add_var(Tensor::new("a", DataType::Float32, vec![1, 2]).unwrap());
    let b = graph.add_var(Tensor::new("b", DataType::Float32, vec![1, 2]).unwrap());
    graph
        .add_layer(
            OpKind::Tanh,
            "tanh",
            ParamsBlock::new("tanh", OpParams::Plain),
            vec![a],
            vec![Some(b)],
        )
        .unwrap();
    graph.set_inputs(vec![a]);
    graph.set_outputs(vec![b]);
    Session::new().with_graph(graph)
}

#[test]
fn container_layout_is_page_aligned() {
    let blob = rein_format::dump(&tiny_session()).unwrap();
    assert!(blob.len() > HEADER_SIZE + SECTION_INFO_SIZE);

    // Header page, then the section-info table.
    let version = check_version(&blob).unwrap();
    assert_eq!(version, FormatVersion { major: 2, minor: 0 });

    let info = &blob[HEADER_SIZE..];
    let section_info_size = u32::from_le_bytes(info[0..4].try_into().unwrap());
    let section_count = u32::from_le_bytes(info[4..8].try_into().unwrap());
    assert_eq!(section_info_size as usize, SECTION_INFO_SIZE);
    assert_eq!(section_count, 1);

    let session_page = u32::from_le_bytes(info[8..12].try_into().unwrap()) as usize;
    let model_page = u32::from_le_bytes(info[12..16].try_into().unwrap()) as usize;
    assert_eq!(session_page, 2);
    assert!(model_page > session_page);
    assert!(model_page * PAGE_SIZE <= blob.len());
}

#[test]
fn dump_to_disk_and_reimport() {
    let session = tiny_session();
    let blob = rein_format::dump(&session).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rnb");
    fs::write(&path, &blob).unwrap();

    let bytes: Arc<[u8]> = Arc::from(fs::read(&path).unwrap());
    let loaded = rein_format::import(bytes).unwrap();
    let graph = loaded.model.graph().unwrap();
    assert_eq!(graph.layer_count(), 1);
    assert_eq!(graph.layer(0).unwrap().op_kind(), Some(OpKind::Tanh));
}

#[test]
fn import_rejects_wrong_magic() {
    let mut blob = rein_format::dump(&tiny_session()).unwrap();
    blob[0] = b'X';
    assert!(rein_format::import(Arc::from(blob)).is_err());
}

#[test]
fn import_rejects_old_version() {
    let mut blob = rein_format::dump(&tiny_session()).unwrap();
    // Overwrite the version field with a pre-1.0 string.
    let at = 62;
    blob[at..at + 4].copy_from_slice(b"0.3\n");
    let err = rein_format::import(Arc::from(blob)).unwrap_err();
    assert!(err.to_string().contains("0.3"));
}

#[test]
fn import_rejects_empty_buffer() {
    assert!(rein_format::import(Arc::from(Vec::new())).is_err());
}
