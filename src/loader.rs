use crate::error::PfResult;
use crate::solution::{normalize_pair, Peptide, Solution};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Reads excluded pairs from CSV with a header row and two peptide columns.
/// Rows that do not hold two peptide ids, and self-pairs, are skipped.
pub fn load_invalid_pairs<R: Read>(reader: R) -> PfResult<BTreeSet<(Peptide, Peptide)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut pairs = BTreeSet::new();
    let mut skipped_count = 0;

    for (row_idx, result) in rdr.records().enumerate() {
        let rec = match result {
            Ok(rec) => rec,
            Err(e) => {
                warn!("[Row {}] CSV Parse Error: {}", row_idx + 1, e);
                skipped_count += 1;
                continue;
            }
        };
        if rec.len() < 2 {
            skipped_count += 1;
            continue;
        }
        let (a, b) = match (rec[0].parse::<Peptide>(), rec[1].parse::<Peptide>()) {
            (Ok(a), Ok(b)) => (a, b),
            _ => {
                skipped_count += 1;
                continue;
            }
        };
        if a == b {
            skipped_count += 1;
            continue;
        }
        pairs.insert(normalize_pair(a, b));
    }

    if skipped_count > 0 {
        warn!("Skipped {} invalid rows in excluded pairs.", skipped_count);
    }
    debug!(pairs = pairs.len(), "loaded excluded pairs");
    Ok(pairs)
}

pub fn load_invalid_pairs_from_file<P: AsRef<Path>>(
    path: P,
) -> PfResult<BTreeSet<(Peptide, Peptide)>> {
    let file = File::open(path)?;
    load_invalid_pairs(file)
}

/// Loads a JSON solution and checks its structural invariants.
pub fn load_solution<P: AsRef<Path>>(path: P) -> PfResult<Solution> {
    let content = fs::read_to_string(path)?;
    let solution: Solution = serde_json::from_str(&content)?;
    solution.validate()?;
    Ok(solution)
}

pub fn save_solution<P: AsRef<Path>>(solution: &Solution, path: P) -> PfResult<()> {
    let json = serde_json::to_string_pretty(solution)?;
    fs::write(path, json)?;
    Ok(())
}

/// One row per placement: `replicate,pool,peptide`, with 1-based replicate
/// and pool numbers as printed on a plate map.
pub fn write_assignments_csv<W: Write>(solution: &Solution, writer: W) -> PfResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["replicate", "pool", "peptide"])?;
    for (&replicate, pools) in solution.assignments() {
        for (&pool, peptides) in pools {
            for peptide in peptides {
                wtr.write_record([
                    (replicate + 1).to_string(),
                    (pool + 1).to_string(),
                    peptide.to_string(),
                ])?;
            }
        }
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pairs_skip_bad_rows() {
        let data = "a,b\n3,1\n2,2\nx,4\n5\n 7 , 6 \n1,3\n";
        let pairs = load_invalid_pairs(data.as_bytes()).unwrap();
        assert_eq!(pairs.into_iter().collect::<Vec<_>>(), vec![(1, 3), (6, 7)]);
    }

    #[test]
    fn test_solution_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solution.json");
        let s = Solution::from_nested(3, [(4, 0)], vec![vec![vec![0, 1], vec![2, 3, 4]]])
            .unwrap();

        save_solution(&s, &path).unwrap();
        let loaded = load_solution(&path).unwrap();

        assert_eq!(loaded, s);
    }

    #[test]
    fn test_load_rejects_overfull_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"max_peptides_per_pool": 1, "invalid_neighbors": [], "assignments": {"0": {"0": [1, 2]}}}"#,
        )
        .unwrap();

        assert!(load_solution(&path).is_err());
    }

    #[test]
    fn test_assignment_csv_is_one_based() {
        let s = Solution::from_nested(2, [], vec![vec![vec![5], vec![6, 7]]]).unwrap();
        let mut out = Vec::new();
        write_assignments_csv(&s, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "replicate,pool,peptide\n1,1,5\n1,2,6\n1,2,7\n"
        );
    }
}
