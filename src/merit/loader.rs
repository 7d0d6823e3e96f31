use super::Operand;
use crate::error::{LensForgeError, LfResult};
use crate::value::Value;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum OperandDocument {
    List(Vec<Operand>),
    Editor { operands: Vec<Operand> },
}

/// Reads merit editor rows from `.csv`, or JSON (a bare array or `{ "operands": [...] }`).
pub fn load_operands<P: AsRef<Path>>(path: P) -> LfResult<Vec<Operand>> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let file = File::open(path)?;
    let ops = if is_csv {
        read_csv(file)?
    } else {
        read_json(file)?
    };
    debug!(path = %path.display(), count = ops.len(), "operands loaded");
    Ok(ops)
}

pub fn read_json<R: Read>(reader: R) -> LfResult<Vec<Operand>> {
    Ok(match serde_json::from_reader(reader)? {
        OperandDocument::List(ops) => ops,
        OperandDocument::Editor { operands } => operands,
    })
}

/// Header names are matched case-insensitively; unknown columns are ignored.
pub fn read_csv<R: Read>(reader: R) -> LfResult<Vec<Operand>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let operand_col = column("operand").ok_or_else(|| {
        LensForgeError::Validation("merit CSV has no 'operand' column".to_string())
    })?;
    let cols = [
        "id", "configid", "param1", "param2", "param3", "param4", "param5", "target", "weight",
    ]
    .map(column);

    let mut ops = Vec::new();
    let mut skipped = 0;
    for (row_idx, result) in rdr.records().enumerate() {
        let rec = match result {
            Ok(rec) => rec,
            Err(e) => {
                warn!(row = row_idx + 1, error = %e, "unreadable merit row");
                skipped += 1;
                continue;
            }
        };
        let name = rec.get(operand_col).unwrap_or("");
        if name.is_empty() {
            skipped += 1;
            continue;
        }
        let cell = |i: usize| -> Value {
            cols[i]
                .and_then(|c| rec.get(c))
                .map(Value::parse)
                .unwrap_or_default()
        };
        ops.push(Operand {
            id: cell(0),
            operand: name.to_string(),
            config_id: cols[1]
                .and_then(|c| rec.get(c))
                .unwrap_or("")
                .to_string(),
            param1: cell(2),
            param2: cell(3),
            param3: cell(4),
            param4: cell(5),
            param5: cell(6),
            target: cell(7),
            weight: cell(8),
            value: None,
            contribution: None,
        });
    }

    if skipped > 0 {
        warn!(skipped, "skipped merit rows without an operand");
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows() {
        let data = "Operand,ConfigId,Param1,Param2,Target,Weight\n\
                    EFL,,,,100,1\n\
                    TOT3_SPH,A,1,\"0,1\",0,2\n\
                    ,,,,,\n";
        let ops = read_csv(data.as_bytes()).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operand, "EFL");
        assert_eq!(ops[0].target, Value::Number(100.0));
        assert!(ops[0].param1.is_auto());
        assert_eq!(ops[1].config_id, "A");
        assert_eq!(ops[1].param2, Value::Text("0,1".into()));
        assert_eq!(ops[1].weight, Value::Number(2.0));
    }

    #[test]
    fn test_json_shapes() {
        let bare = r#"[{"operand":"BFL","param1":"0.4861"}]"#;
        let wrapped = r#"{"operands":[{"operand":"BFL","param1":0.4861}]}"#;
        let a = read_json(bare.as_bytes()).unwrap();
        let b = read_json(wrapped.as_bytes()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].param1, Value::Number(0.4861));
    }
}
