//! The binary-to-text conversion pipeline.
//!
//! Materializes the effective schema and the payload as uniquely named
//! scratch files, invokes `flatc` to decode the payload to JSON, rewrites
//! classified byte-array fields as base64, and returns the pretty-printed
//! result. Scratch files are private per conversion and removed on every
//! exit path; removal failures are logged, never surfaced.

use crate::flatc::{FlatcError, FlatcLocator};
use crate::rewrite;
use crate::schema::BinaryFieldClassifier;
use crate::source::SchemaSource;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Flatc(#[from] FlatcError),

    #[error("flatc decode failed ({status})\nstderr: {stderr}\nstdout: {stdout}")]
    Decoder {
        status: String,
        stderr: String,
        stdout: String,
    },

    #[error("flatc produced no output file at {0:?}")]
    MissingOutput(PathBuf),

    #[error("failed to parse flatc output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Turns raw payload bytes into display-ready structured text.
///
/// The only contract the display layer needs: feed in the file's bytes,
/// get back pretty-printed JSON, or a single descriptive error. No
/// partial result is ever returned from a failed decode.
///
/// # Example
/// ```no_run
/// use flatview::{Converter, FlatcLocator, SchemaSource};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let payload = std::fs::read("document.bin")?;
///
/// let locator = FlatcLocator::new(FlatcLocator::default_install_dir().unwrap());
/// let source = SchemaSource::discover(&std::env::current_dir()?)?;
///
/// let text = Converter::new(&locator, &source).convert(&payload)?;
/// println!("{text}");
/// # Ok(())
/// # }
/// ```
pub struct Converter<'a> {
    locator: &'a FlatcLocator,
    source: &'a SchemaSource,
}

impl<'a> Converter<'a> {
    pub fn new(locator: &'a FlatcLocator, source: &'a SchemaSource) -> Self {
        Self { locator, source }
    }

    /// Decode a payload against the effective schema.
    ///
    /// The schema source is consulted fresh on every call, so an override
    /// set between conversions takes effect immediately.
    pub fn convert(&self, payload: &[u8]) -> Result<String, ConvertError> {
        let schema_text = self.source.effective_schema_text();
        self.convert_with_schema(payload, &schema_text)
    }

    /// Decode a payload against caller-supplied schema text.
    pub fn convert_with_schema(
        &self,
        payload: &[u8],
        schema_text: &str,
    ) -> Result<String, ConvertError> {
        let scratch_dir = std::env::temp_dir();
        // Fresh token per call: rapid conversions of different documents
        // share the scratch directory and must not collide.
        let token = Uuid::new_v4();
        let schema_path = scratch_dir.join(format!("flatview-{token}.fbs"));
        let payload_path = scratch_dir.join(format!("flatview-{token}.bin"));
        let output_path = scratch_dir.join(format!("flatview-{token}.json"));

        let mut scratch = ScratchFiles::new(vec![schema_path.clone(), payload_path.clone()]);
        fs::write(&schema_path, schema_text)?;
        fs::write(&payload_path, payload)?;

        let flatc = self.locator.resolve()?;

        let output = Command::new(&flatc)
            .arg("--json")
            .arg("--strict-json")
            .arg("--allow-non-utf8")
            .arg("--raw-binary")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&scratch_dir)
            .arg(&schema_path)
            .arg("--")
            .arg(&payload_path)
            .output()?;

        if !output.status.success() {
            return Err(decoder_failure(&output));
        }

        scratch.track(output_path.clone());
        if !output_path.is_file() {
            return Err(ConvertError::MissingOutput(output_path));
        }
        let decoded = fs::read_to_string(&output_path)?;
        drop(scratch);

        let mut tree: serde_json::Value = serde_json::from_str(&decoded)?;
        let classifier = BinaryFieldClassifier::parse(schema_text);
        rewrite::encode_binary_fields(&mut tree, &classifier);

        Ok(serde_json::to_string_pretty(&tree)?)
    }
}

/// Scratch files removed on drop, so every exit path cleans up.
struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(error) = fs::remove_file(path) {
                if error.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), %error, "failed to remove scratch file");
                }
            }
        }
    }
}

fn decoder_failure(output: &std::process::Output) -> ConvertError {
    let status = match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => match signal_of(&output.status) {
            Some(signal) => format!("terminated by signal {signal}"),
            None => "unknown exit status".to_string(),
        },
    };
    ConvertError::Decoder {
        status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
    }
}

#[cfg(unix)]
fn signal_of(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::source::SchemaSource;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn fake_flatc(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("flatc");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn source_in(dir: &Path) -> SchemaSource {
        SchemaSource::new(None, dir.join("config.toml"))
    }

    /// Fake decoder: finds the `-o` directory and the payload path, and
    /// writes `{stem}.json` the way flatc does.
    const DECODE_SCRIPT: &str = r#"#!/bin/sh
out=""
last=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    shift
    out="$1"
  else
    last="$1"
  fi
  shift
done
base=$(basename "$last" .bin)
printf '%s' '{"name":"doc","data":[104,105]}' > "$out/$base.json"
"#;

    #[test]
    fn test_convert_encodes_binary_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let flatc = fake_flatc(temp_dir.path(), DECODE_SCRIPT);
        let locator = FlatcLocator::with_resolved(flatc);
        let source = source_in(temp_dir.path());

        let converter = Converter::new(&locator, &source);
        let text = converter
            .convert_with_schema(b"\x00\x01", "table T {\n  data: [ubyte];\n}\n")
            .unwrap();

        let tree: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(tree["name"], "doc");
        assert_eq!(tree["data"], "aGk=");
    }

    #[test]
    fn test_decoder_failure_reports_exit_code_and_stderr() {
        let temp_dir = tempfile::tempdir().unwrap();
        let flatc = fake_flatc(
            temp_dir.path(),
            "#!/bin/sh\necho 'schema mismatch' >&2\nexit 1\n",
        );
        let locator = FlatcLocator::with_resolved(flatc);
        let source = source_in(temp_dir.path());

        let converter = Converter::new(&locator, &source);
        let error = converter
            .convert_with_schema(b"\x00", "table T {\n  data: [ubyte];\n}\n")
            .unwrap_err();

        let message = error.to_string();
        assert!(message.contains("exit code 1"), "message was: {message}");
        assert!(message.contains("schema mismatch"), "message was: {message}");
    }

    #[test]
    fn test_missing_output_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let flatc = fake_flatc(temp_dir.path(), "#!/bin/sh\nexit 0\n");
        let locator = FlatcLocator::with_resolved(flatc);
        let source = source_in(temp_dir.path());

        let converter = Converter::new(&locator, &source);
        let result = converter.convert_with_schema(b"\x00", "table T {\n  data: [ubyte];\n}\n");

        assert!(matches!(result, Err(ConvertError::MissingOutput(_))));
    }

    #[test]
    fn test_convert_uses_default_schema_when_no_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        let flatc = fake_flatc(temp_dir.path(), DECODE_SCRIPT);
        let locator = FlatcLocator::with_resolved(flatc);
        let source = source_in(temp_dir.path());

        let converter = Converter::new(&locator, &source);
        let text = converter.convert(b"\x00\x01").unwrap();

        // "data" is classified by the default schema's safety net.
        let tree: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(tree["data"], "aGk=");
    }
}
