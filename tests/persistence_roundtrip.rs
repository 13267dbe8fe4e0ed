//! Write/read round-trip laws for both index families.

mod common;

use common::blob_corpus;
use proxima::ivf::{IvfIndex, IvfParams, PqParams};
use proxima::vamana::{VamanaIndex, VamanaParams};
use proxima::{ColMajorMatrix, Context, SearchError};

#[test]
fn ivf_round_trip_preserves_everything() {
    let corpus = blob_corpus(600, 32, 8, 3.0, 71);
    let ctx = Context::new(71);
    let params = IvfParams {
        nlist: 8,
        max_iter: 4,
        ..IvfParams::default()
    };
    let idx = IvfIndex::train(&corpus, params, &ctx).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ivf_group");
    idx.write_index(&path).unwrap();
    let idx2 = IvfIndex::<f32>::read_index(&path).unwrap();

    assert!(idx.compare_metadata(&idx2));
    assert!(idx.compare_centroids(&idx2));
    assert!(idx.compare_shuffled_ids(&idx2));
    assert!(idx.compare_shuffled_vectors(&idx2));

    // A loaded index answers queries identically.
    let queries = ColMajorMatrix::from_columns(&[corpus.column(5).to_vec()]).unwrap();
    let a = idx.query_infinite_ram(&queries, 5, 3, &ctx).unwrap();
    let b = idx2.query_infinite_ram(&queries, 5, 3, &ctx).unwrap();
    assert_eq!(a, b);
}

#[test]
fn ivf_round_trip_with_size_index_interpretation() {
    let corpus = blob_corpus(400, 16, 4, 3.0, 73);
    let ctx = Context::new(73);
    let params = IvfParams {
        nlist: 4,
        max_iter: 4,
        ..IvfParams::default()
    };
    let idx = IvfIndex::train(&corpus, params, &ctx).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ivf_sizes");
    // Store partition_indexes as cluster sizes; the reader prefix-sums.
    idx.write_index_with(&path, true).unwrap();
    let idx2 = IvfIndex::<f32>::read_index(&path).unwrap();

    assert!(idx.compare_shuffled_ids(&idx2));
    assert!(idx.compare_shuffled_vectors(&idx2));
}

#[test]
fn ivf_pq_round_trip_preserves_codes_and_tables() {
    let corpus = blob_corpus(800, 32, 8, 3.0, 79);
    let ctx = Context::new(79);
    let params = IvfParams {
        nlist: 8,
        max_iter: 4,
        pq: Some(PqParams {
            num_subspaces: 4,
            bits_per_subspace: 6,
        }),
        ..IvfParams::default()
    };
    let idx = IvfIndex::train(&corpus, params, &ctx).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ivf_pq_group");
    idx.write_index(&path).unwrap();
    let idx2 = IvfIndex::<f32>::read_index(&path).unwrap();

    assert!(idx.compare_metadata(&idx2));
    let pq = idx.pq().unwrap();
    let pq2 = idx2.pq().unwrap();
    assert_eq!(pq.codes, pq2.codes);
    assert_eq!(pq.quantizer, pq2.quantizer);

    let queries = ColMajorMatrix::from_columns(&[corpus.column(9).to_vec()]).unwrap();
    let a = idx.query_finite_ram(&queries, 5, 3, 128, &ctx).unwrap();
    let b = idx2.query_finite_ram(&queries, 5, 3, 128, &ctx).unwrap();
    assert_eq!(a, b);
}

#[test]
fn vamana_round_trip_preserves_everything() {
    let corpus = blob_corpus(500, 24, 6, 3.0, 83);
    let ctx = Context::new(83);
    let params = VamanaParams {
        l_build: 20,
        r_max_degree: 10,
        b_backtrack: 3,
        alpha_min: 1.0,
        alpha_max: 1.2,
    };
    let idx = VamanaIndex::train(&corpus, params, &ctx).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vamana_group");
    idx.write_index(&path).unwrap();
    let idx2 = VamanaIndex::<f32>::read_index(&path).unwrap();

    assert!(idx.compare_metadata(&idx2));
    assert!(idx.compare_feature_vectors(&idx2));
    assert!(idx.compare_graph_edges(&idx2));

    let queries = ColMajorMatrix::from_columns(&[corpus.column(17).to_vec()]).unwrap();
    let a = idx.query(&queries, 5, None, &ctx).unwrap();
    let b = idx2.query(&queries, 5, None, &ctx).unwrap();
    assert_eq!(a, b);
}

#[test]
fn u8_ivf_round_trips() {
    let cols: Vec<Vec<u8>> = (0..120)
        .map(|i| (0..8).map(|d| ((i * 7 + d * 3) % 250) as u8).collect())
        .collect();
    let corpus = ColMajorMatrix::from_columns(&cols).unwrap();
    let ctx = Context::new(89);
    let params = IvfParams {
        nlist: 4,
        max_iter: 3,
        ..IvfParams::default()
    };
    let idx = IvfIndex::train(&corpus, params, &ctx).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ivf_u8");
    idx.write_index(&path).unwrap();
    let idx2 = IvfIndex::<u8>::read_index(&path).unwrap();
    assert!(idx.compare_shuffled_vectors(&idx2));
}

#[test]
fn missing_metadata_key_is_reported_as_not_found() {
    let corpus = blob_corpus(200, 8, 2, 3.0, 97);
    let ctx = Context::new(97);
    let idx = VamanaIndex::train(
        &corpus,
        VamanaParams {
            l_build: 10,
            r_max_degree: 6,
            ..VamanaParams::default()
        },
        &ctx,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken_group");
    idx.write_index(&path).unwrap();

    // Corrupt the manifest: drop the medoid key.
    let manifest_path = path.join("manifest.json");
    let text = std::fs::read_to_string(&manifest_path).unwrap();
    let mut manifest: serde_json::Value = serde_json::from_str(&text).unwrap();
    manifest["metadata"]
        .as_object_mut()
        .unwrap()
        .remove("medioid");
    std::fs::write(&manifest_path, serde_json::to_string(&manifest).unwrap()).unwrap();

    let err = VamanaIndex::<f32>::read_index(&path).unwrap_err();
    assert_eq!(err, SearchError::MissingMetadata("medioid".to_string()));
}

#[test]
fn wrong_metadata_datatype_is_reported_as_unsupported() {
    let corpus = blob_corpus(200, 8, 2, 3.0, 101);
    let ctx = Context::new(101);
    let idx = IvfIndex::train(
        &corpus,
        IvfParams {
            nlist: 2,
            max_iter: 3,
            ..IvfParams::default()
        },
        &ctx,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_type_group");
    idx.write_index(&path).unwrap();

    let manifest_path = path.join("manifest.json");
    let text = std::fs::read_to_string(&manifest_path).unwrap();
    let mut manifest: serde_json::Value = serde_json::from_str(&text).unwrap();
    manifest["metadata"]["nlist"] = serde_json::Value::String("two".to_string());
    std::fs::write(&manifest_path, serde_json::to_string(&manifest).unwrap()).unwrap();

    let err = IvfIndex::<f32>::read_index(&path).unwrap_err();
    assert_eq!(err, SearchError::UnsupportedDatatype("nlist".to_string()));
}
