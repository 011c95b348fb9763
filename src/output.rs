use crate::config::DeviceReport;
use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub enum Writer {
    Stdout(Box<dyn Write>, bool), // bool selects pretty printing
    JsonFile(BufWriter<File>, bool), // bool tracks if we've written the opening bracket
    JsonlFile(BufWriter<File>),
}

impl Writer {
    pub fn write_batch(&mut self, reports: &[DeviceReport]) -> Result<()> {
        match self {
            Writer::Stdout(writer, pretty) => {
                for report in reports {
                    let serialized = if *pretty {
                        serde_json::to_string_pretty(report)?
                    } else {
                        serde_json::to_string(report)?
                    };
                    writeln!(writer, "{}", serialized)?;
                }
            }
            Writer::JsonFile(writer, is_first) => {
                for report in reports {
                    if *is_first {
                        write!(writer, "[")?;
                        *is_first = false;
                    } else {
                        write!(writer, ",")?;
                    }
                    let serialized = serde_json::to_string_pretty(report)?;
                    write!(writer, "\n{}", serialized)?;
                }
            }
            Writer::JsonlFile(writer) => {
                for report in reports {
                    let serialized = serde_json::to_string(report)?;
                    writeln!(writer, "{}", serialized)?;
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        match self {
            Writer::JsonFile(ref mut writer, is_first) => {
                if is_first {
                    write!(writer, "[")?;
                }
                writeln!(writer, "\n]")?;
                writer.flush()?;
            }
            Writer::JsonlFile(ref mut writer) => {
                writer.flush()?;
            }
            Writer::Stdout(ref mut writer, _) => {
                writer.flush()?;
            }
        }
        Ok(())
    }
}

pub fn create_writer(output_arg: &str) -> Result<Writer> {
    match output_arg {
        "stdout" => Ok(Writer::Stdout(Box::new(io::stdout()), true)),
        "json" => Ok(Writer::Stdout(Box::new(io::stdout()), false)), // one report per line
        path if path.ends_with(".json") => {
            create_parent_dirs(path)?;
            let file = File::create(path)?;
            Ok(Writer::JsonFile(BufWriter::new(file), true))
        }
        path if path.ends_with(".jsonl") || path.ends_with(".ndjson") => {
            create_parent_dirs(path)?;
            let file = File::create(path)?;
            Ok(Writer::JsonlFile(BufWriter::new(file)))
        }
        path => {
            // Default to JSON file if it looks like a path
            if path.contains('/') || path.contains('\\') || path.contains('.') {
                create_parent_dirs(path)?;
                let file = File::create(path)?;
                Ok(Writer::JsonFile(BufWriter::new(file), true))
            } else {
                Err(anyhow!(
                    "Unknown output format: {}. Use 'stdout', 'json', or a file path",
                    output_arg
                ))
            }
        }
    }
}

fn create_parent_dirs(file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(file_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::Platform;
    use serde_json::Value;

    fn report(id: &str) -> DeviceReport {
        DeviceReport {
            device_id: Some(id.to_string()),
            platform: Platform::MacOs,
            ..Default::default()
        }
    }

    fn write_all(path: &str, reports: &[DeviceReport]) {
        let mut writer = create_writer(path).unwrap();
        writer.write_batch(reports).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn json_file_is_a_valid_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        let path = path.to_str().unwrap();

        let mut writer = create_writer(path).unwrap();
        writer.write_batch(&[report("a")]).unwrap();
        writer.write_batch(&[report("b"), report("c")]).unwrap();
        writer.finish().unwrap();

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        let ids: Vec<&str> = parsed
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["deviceId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(parsed[0]["platform"], "macos");
    }

    #[test]
    fn empty_json_file_is_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        write_all(path.to_str().unwrap(), &[]);
        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, Value::Array(vec![]));
    }

    #[test]
    fn jsonl_file_has_one_report_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        write_all(path.to_str().unwrap(), &[report("a"), report("b")]);
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"deviceId\":\"b\""));
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(create_writer("yaml").is_err());
    }
}
