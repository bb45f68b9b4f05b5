//! Render the causal graph of a document as an SVG by piping it through graphviz.

use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::io::Write as _;
use std::process::{Command, Stdio};
use anyhow::anyhow;

#[derive(Debug)]
struct DotError;

impl Display for DotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("dot command failed with an error")
    }
}

impl std::error::Error for DotError {}

pub fn generate_svg_with_dot(dot_content: String, dot_path: Option<OsString>) -> Result<String, anyhow::Error> {
    let dot_path = dot_path.unwrap_or_else(|| "dot".into());
    let mut child = Command::new(dot_path)
        .arg("-Tsvg")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("could not open stdin of dot"))?;
    // Write from another thread so a full stdout pipe can't deadlock us. See:
    // https://doc.rust-lang.org/std/process/index.html#handling-io
    let writer = std::thread::spawn(move || stdin.write_all(dot_content.as_bytes()));

    let out = child.wait_with_output()?;
    std::io::stderr().write_all(&out.stderr)?;

    if let Ok(Err(e)) = writer.join() {
        log::warn!("Writing to dot failed: {e}");
    }

    if out.status.success() {
        Ok(String::from_utf8(out.stdout)?)
    } else {
        std::io::stdout().write_all(&out.stdout)?;
        Err(DotError.into())
    }
}
