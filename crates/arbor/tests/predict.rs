use std::ffi::{c_int, c_void};
use std::ptr::NonNull;
use arbor::{
    ConfigurationError,
    DenseBatch,
    Entry,
    Error,
    LoadError,
    PredictOptions,
    Predictor,
    SparseBatch,
    SymbolMap,
    SymbolSource,
};

const NUM_COL: usize = 4;
const NUM_GROUP: usize = 3;

extern "C" fn num_groups_single() -> usize {
    1
}

extern "C" fn num_groups_multi() -> usize {
    NUM_GROUP
}

/// # Safety
///
/// `row` points at `NUM_COL` entries that stay valid for `'a`.
unsafe fn row_values<'a>(row: *const Entry) -> &'a [Entry] {
    unsafe { std::slice::from_raw_parts(row, NUM_COL) }
}

/// Weighted sum over present columns, missing columns contribute -0.5.
extern "C" fn predict_weighted(row: *mut Entry, pred_margin: c_int) -> f32 {
    let row = unsafe { row_values(row) };
    let margin: f32 = row
        .iter()
        .enumerate()
        .map(|(col, entry)| entry.value().map_or(-0.5, |value| value * (col + 1) as f32))
        .sum();
    if pred_margin != 0 {
        margin
    } else {
        1.0 / (1.0 + (-margin).exp())
    }
}

/// One score per group.
extern "C" fn predict_groups(row: *mut Entry, _pred_margin: c_int, out: *mut f32) -> usize {
    let row = unsafe { row_values(row) };
    let out = unsafe { std::slice::from_raw_parts_mut(out, NUM_GROUP) };
    for (group, slot) in out.iter_mut().enumerate() {
        *slot = row
            .iter()
            .skip(group)
            .filter_map(Entry::value)
            .sum();
    }
    NUM_GROUP
}

/// Only the best group's score, at the front of the row.
extern "C" fn predict_top_score(row: *mut Entry, pred_margin: c_int, out: *mut f32) -> usize {
    predict_groups(row, pred_margin, out);
    let out = unsafe { std::slice::from_raw_parts_mut(out, NUM_GROUP) };
    out[0] = out.iter().copied().fold(f32::MIN, f32::max);
    1
}

fn load(symbols: SymbolMap) -> Predictor {
    let mut predictor = Predictor::new();
    predictor.load_from(symbols).unwrap();
    predictor
}

fn single_output() -> Predictor {
    load(
        SymbolMap::new("weighted")
            .with_query(num_groups_single)
            .with_predict(predict_weighted),
    )
}

fn multi_output() -> Predictor {
    load(
        SymbolMap::new("groups")
            .with_query(num_groups_multi)
            .with_predict_multiclass(predict_groups),
    )
}

/// A dense batch with a NaN every fifth value.
fn dense_data(num_row: usize) -> Vec<f32> {
    (0..num_row * NUM_COL)
        .map(|i| if i % 5 == 0 { f32::NAN } else { (i % 11) as f32 * 0.25 })
        .collect()
}

/// A sparse batch where row `r` lists columns `0..r % (NUM_COL + 1)`.
fn sparse_data(num_row: usize) -> (Vec<f32>, Vec<u32>, Vec<usize>) {
    let mut data = vec![];
    let mut col_index = vec![];
    let mut row_offset = vec![0];
    for row in 0..num_row {
        for col in 0..row % (NUM_COL + 1) {
            data.push((row + col) as f32 * 0.5);
            col_index.push(col as u32);
        }
        row_offset.push(data.len());
    }
    (data, col_index, row_offset)
}

fn thread_counts() -> Vec<usize> {
    vec![1, 2, 0]
}

#[test]
fn dense_results_do_not_depend_on_thread_count() {
    let predictor = multi_output();
    let data = dense_data(97);
    let batch = DenseBatch::new(&data, 97, NUM_COL, f32::NAN).unwrap();

    let baseline = predictor
        .predict(&batch, &PredictOptions::new().with_nthread(1))
        .unwrap();
    assert_eq!(baseline.len(), 97 * NUM_GROUP);

    for nthread in thread_counts() {
        let out = predictor
            .predict(&batch, &PredictOptions::new().with_nthread(nthread))
            .unwrap();
        let same_bits = baseline
            .iter()
            .zip(&out)
            .all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same_bits, "results differ with {nthread} threads");
    }
}

#[test]
fn sparse_results_do_not_depend_on_thread_count() {
    let predictor = single_output();
    let (data, col_index, row_offset) = sparse_data(64);
    let batch = SparseBatch::new(&data, &col_index, &row_offset, NUM_COL).unwrap();

    let baseline = predictor
        .predict(&batch, &PredictOptions::new().with_nthread(1).with_pred_margin(true))
        .unwrap();

    for nthread in thread_counts() {
        let out = predictor
            .predict(&batch, &PredictOptions::new().with_nthread(nthread).with_pred_margin(true))
            .unwrap();
        assert_eq!(
            baseline.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            out.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
        );
    }
}

#[test]
fn repeated_predictions_are_identical() {
    let predictor = single_output();
    let data = dense_data(33);
    let batch = DenseBatch::new(&data, 33, NUM_COL, f32::NAN).unwrap();
    let options = PredictOptions::new().with_nthread(2);

    let mut first = vec![0.0; 33];
    let mut second = vec![0.0; 33];
    predictor.predict_batch(&batch, &options, &mut first).unwrap();
    predictor.predict_batch(&batch, &options, &mut second).unwrap();

    assert_eq!(
        first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
        second.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
    );
}

#[test]
fn sparse_rows_see_only_their_own_columns() {
    // rows alternate between every column set and none; a leaked value from
    // a previous row would change the empty rows' margin
    let predictor = single_output();
    let data = [1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0];
    let col_index = [0, 1, 2, 3, 0, 1, 2, 3];
    let row_offset = [0, 4, 4, 8, 8];
    let batch = SparseBatch::new(&data, &col_index, &row_offset, NUM_COL).unwrap();

    let out = predictor
        .predict(&batch, &PredictOptions::new().with_nthread(1).with_pred_margin(true))
        .unwrap();

    assert_eq!(out, vec![30.0, -2.0, 30.0, -2.0]);
}

#[test]
fn margin_flag_reaches_the_routine() {
    let predictor = single_output();
    let data = [0.0, 0.0, 0.0, 0.0];
    let batch = DenseBatch::new(&data, 1, NUM_COL, f32::NAN).unwrap();

    let margin = predictor
        .predict(&batch, &PredictOptions::new().with_pred_margin(true))
        .unwrap();
    let transformed = predictor.predict(&batch, &PredictOptions::new()).unwrap();

    assert_eq!(margin, vec![0.0]);
    assert_eq!(transformed, vec![0.5]);
}

#[test]
fn top_score_output_is_compacted() {
    let predictor = load(
        SymbolMap::new("top")
            .with_query(num_groups_multi)
            .with_predict_multiclass(predict_top_score),
    );
    let data = dense_data(10);
    let batch = DenseBatch::new(&data, 10, NUM_COL, f32::NAN).unwrap();
    let full = multi_output()
        .predict(&batch, &PredictOptions::new())
        .unwrap();

    assert_eq!(predictor.query_result_size(&batch).unwrap(), 10 * NUM_GROUP);
    let mut out = vec![0.0; 10 * NUM_GROUP];
    let size = predictor
        .predict_batch(&batch, &PredictOptions::new().with_nthread(3), &mut out)
        .unwrap();

    assert_eq!(size, 10);
    let expected: Vec<f32> = full
        .chunks(NUM_GROUP)
        .map(|row| row.iter().copied().fold(f32::MIN, f32::max))
        .collect();
    assert_eq!(&out[..size], expected.as_slice());
}

#[test]
fn numeric_sentinel_rejects_nan() {
    let predictor = single_output();
    let data = dense_data(4);
    let batch = DenseBatch::new(&data, 4, NUM_COL, -1.0).unwrap();

    let err = predictor
        .predict(&batch, &PredictOptions::new().with_nthread(1))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::NanWithoutNanSentinel { row: 0, col: 0 })
    ));
}

/// Serves another source's routines under its own name.
struct Renamed(SymbolMap);

// SAFETY: forwards addresses registered through the typed `SymbolMap` builders.
unsafe impl SymbolSource for Renamed {
    fn name(&self) -> &str {
        "renamed"
    }

    fn symbol(&self, symbol: &str) -> Result<NonNull<c_void>, LoadError> {
        self.0.symbol(symbol)
    }
}

#[test]
fn custom_symbol_source() {
    let mut predictor = Predictor::new();
    predictor
        .load_from(Renamed(
            SymbolMap::new("weighted")
                .with_query(num_groups_single)
                .with_predict(predict_weighted),
        ))
        .unwrap();

    assert_eq!(predictor.num_output_group().unwrap(), 1);
    assert!(format!("{predictor:?}").contains("renamed"));

    let data = [1.0, 1.0, 1.0, 1.0];
    let batch = DenseBatch::new(&data, 1, NUM_COL, f32::NAN).unwrap();
    let out = predictor
        .predict(&batch, &PredictOptions::new().with_pred_margin(true))
        .unwrap();
    assert_eq!(out, vec![10.0]);
}

#[test]
fn predict_requires_load() {
    let predictor = Predictor::new();
    let data = [0.0; NUM_COL];
    let batch = DenseBatch::new(&data, 1, NUM_COL, f32::NAN).unwrap();

    assert!(matches!(
        predictor.predict(&batch, &PredictOptions::new()),
        Err(Error::NotLoaded)
    ));
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[test]
fn shared_library_without_query_symbol() {
    let mut predictor = Predictor::new();
    let err = unsafe { predictor.load("libc.so.6") }.unwrap_err();

    match err {
        Error::Load(LoadError::MissingSymbol { symbol, .. }) => {
            assert_eq!(symbol, "get_num_output_group");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!predictor.is_loaded());
}

#[test]
fn missing_artifact() {
    let mut predictor = Predictor::new();
    assert!(matches!(
        unsafe { predictor.load("./no-such-model.so") },
        Err(Error::Load(LoadError::Open { .. }))
    ));
}
