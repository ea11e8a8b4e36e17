//! Interactive prompts and the mount-collection sequence built on them.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::{color_enabled_stderr, paint};

/// Input checks applied to a prompt answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    None,
    /// `y`/`n` (also `yes`/`no`, any case); answers are normalized to `y` or `n`.
    YesNo,
    /// An existing host directory; a leading `~/` is expanded.
    DirExists,
}

impl Validator {
    /// Normalized answer, or a reason suitable for re-prompting.
    pub fn check(&self, input: &str) -> Result<String, String> {
        let input = input.trim();
        match self {
            Validator::None => Ok(input.to_string()),
            Validator::YesNo => match input.to_ascii_lowercase().as_str() {
                "y" | "yes" => Ok("y".to_string()),
                "n" | "no" => Ok("n".to_string()),
                _ => Err("please answer y or n".to_string()),
            },
            Validator::DirExists => {
                if input.is_empty() {
                    return Err("a directory is required".to_string());
                }
                let p = expand_tilde(input);
                if p.is_dir() {
                    Ok(p.display().to_string())
                } else {
                    Err(format!("directory does not exist: {}", p.display()))
                }
            }
        }
    }
}

fn expand_tilde(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(h) = home::home_dir() {
            return h.join(rest);
        }
    }
    PathBuf::from(input)
}

/// Source of operator answers.
pub trait Prompter {
    /// Show `text` and read one answer. With `looping`, invalid answers are reported and
    /// the question is asked again; otherwise they fail with `InvalidInput`.
    fn ask(&mut self, text: &str, looping: bool, validator: Validator) -> io::Result<String>;
}

/// Line-oriented prompter over any reader/writer pair (stdin/stderr in the binary).
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
    color: bool,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        TerminalPrompter {
            input: io::stdin().lock(),
            output: io::stderr(),
            color: color_enabled_stderr(),
        }
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalPrompter {
            input,
            output,
            color: false,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn ask(&mut self, text: &str, looping: bool, validator: Validator) -> io::Result<String> {
        loop {
            write!(self.output, "{}", paint(self.color, "\x1b[33m", text))?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input closed while waiting for an answer",
                ));
            }
            match validator.check(&line) {
                Ok(answer) => return Ok(answer),
                Err(reason) if looping => {
                    writeln!(self.output, "{}", paint(self.color, "\x1b[31;1m", &reason))?;
                }
                Err(reason) => return Err(io::Error::new(io::ErrorKind::InvalidInput, reason)),
            }
        }
    }
}

/// Ask a looping y/n question; true only for `y`.
pub fn confirm<P: Prompter + ?Sized>(prompter: &mut P, text: &str) -> io::Result<bool> {
    Ok(prompter.ask(text, true, Validator::YesNo)? == "y")
}

/// One requested host-directory → container-directory bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub source: PathBuf,
    pub target: String,
}

impl MountRequest {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        MountRequest {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Parse `SOURCE:TARGET` as given on the command line. Container targets never
    /// contain `:`, so the last colon splits (`C:\src:/src` works); `~/` in the source
    /// is expanded as in the interactive prompt.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.rsplit_once(':') {
            Some((s, t)) if !s.trim().is_empty() && !t.trim().is_empty() => {
                Ok(MountRequest::new(expand_tilde(s.trim()), t.trim()))
            }
            _ => Err(format!("expected SOURCE:TARGET, got '{value}'")),
        }
    }

    pub fn source_exists(&self) -> bool {
        Path::new(&self.source).is_dir()
    }
}

/// Sequence of additional mounts; `Ok(None)` ends the sequence.
pub trait MountSource {
    fn next_mount(&mut self) -> io::Result<Option<MountRequest>>;
}

/// Fixed list of mounts, e.g. from `--mount` flags.
#[derive(Debug, Default, Clone)]
pub struct MountList(VecDeque<MountRequest>);

impl MountList {
    pub fn new(items: impl IntoIterator<Item = MountRequest>) -> Self {
        MountList(items.into_iter().collect())
    }
}

impl MountSource for MountList {
    fn next_mount(&mut self) -> io::Result<Option<MountRequest>> {
        Ok(self.0.pop_front())
    }
}

pub const ADD_MOUNT_TEXT: &str =
    "Would you like to mount additional docker host directories into the KDK? [y/n] ";
pub const SOURCE_DIR_TEXT: &str =
    "Please enter the docker host source directory (e.g. /Users/<username>/Projects) ";
pub const TARGET_DIR_TEXT: &str =
    "Please enter the docker container target directory (e.g. /home/<username>/Projects) ";

/// Interactive mount questions asked through a `Prompter`.
pub struct PromptMountSource<'a, P: Prompter + ?Sized> {
    prompter: &'a mut P,
}

impl<'a, P: Prompter + ?Sized> PromptMountSource<'a, P> {
    pub fn new(prompter: &'a mut P) -> Self {
        PromptMountSource { prompter }
    }
}

impl<P: Prompter + ?Sized> MountSource for PromptMountSource<'_, P> {
    fn next_mount(&mut self) -> io::Result<Option<MountRequest>> {
        if !confirm(&mut *self.prompter, ADD_MOUNT_TEXT)? {
            return Ok(None);
        }
        let source = self.prompter.ask(SOURCE_DIR_TEXT, true, Validator::DirExists)?;
        tracing::info!(source = %source, "entered host source directory mount");
        let target = self.prompter.ask(TARGET_DIR_TEXT, false, Validator::None)?;
        tracing::info!(target = %target, "entered container target directory mount");
        Ok(Some(MountRequest::new(source, target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(script: &str) -> TerminalPrompter<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_yes_no_normalizes() {
        assert_eq!(Validator::YesNo.check("Y\n").unwrap(), "y");
        assert_eq!(Validator::YesNo.check(" no ").unwrap(), "n");
        assert!(Validator::YesNo.check("maybe").is_err());
    }

    #[test]
    fn test_dir_exists() {
        let td = tempfile::tempdir().expect("tmpdir");
        let dir = td.path().display().to_string();
        assert_eq!(Validator::DirExists.check(&dir).unwrap(), dir);
        assert!(Validator::DirExists
            .check(&td.path().join("missing").display().to_string())
            .is_err());
        assert!(Validator::DirExists.check("  ").is_err());
    }

    #[test]
    fn test_looping_prompt_reasks_until_valid() {
        let mut p = prompter("what\n\ny\n");
        assert!(confirm(&mut p, "? ").unwrap());
        let out = String::from_utf8(p.into_output()).unwrap();
        assert_eq!(out.matches("? ").count(), 3, "output:\n{out}");
        assert!(out.contains("please answer y or n"));
    }

    #[test]
    fn test_non_looping_prompt_fails_on_invalid() {
        let mut p = prompter("nope\n");
        let err = p.ask("? ", false, Validator::YesNo).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_eof_is_an_error() {
        let mut p = prompter("");
        let err = confirm(&mut p, "? ").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_prompt_mount_source_sequence() {
        let td = tempfile::tempdir().expect("tmpdir");
        let src = td.path().display().to_string();
        let missing = td.path().join("missing").display().to_string();
        let script = format!("y\n{missing}\n{src}\n/home/me/src\ny\n{src}\n/work\nn\n");
        let mut p = prompter(&script);
        let mut seq = PromptMountSource::new(&mut p);
        assert_eq!(
            seq.next_mount().unwrap(),
            Some(MountRequest::new(&src, "/home/me/src"))
        );
        assert_eq!(seq.next_mount().unwrap(), Some(MountRequest::new(&src, "/work")));
        assert_eq!(seq.next_mount().unwrap(), None);
    }

    #[test]
    fn test_mount_request_parse() {
        assert_eq!(
            MountRequest::parse("/a:/b").unwrap(),
            MountRequest::new("/a", "/b")
        );
        assert!(MountRequest::parse("/a").is_err());
        assert!(MountRequest::parse(":/b").is_err());
        assert!(MountRequest::parse("/a:").is_err());
    }

    #[test]
    fn test_mount_request_parse_windows_source() {
        let m = MountRequest::parse("C:\\src:/src").unwrap();
        assert_eq!(m.source, PathBuf::from("C:\\src"));
        assert_eq!(m.target, "/src");
    }

    #[test]
    fn test_mount_request_parse_expands_tilde() {
        let Some(home) = home::home_dir() else {
            return;
        };
        let m = MountRequest::parse("~/src:/work").unwrap();
        assert_eq!(m.source, home.join("src"));
        assert_eq!(m.target, "/work");
    }

    #[test]
    fn test_mount_list_drains_in_order() {
        let mut l = MountList::new(vec![
            MountRequest::new("/a", "/x"),
            MountRequest::new("/b", "/y"),
        ]);
        assert_eq!(l.next_mount().unwrap().unwrap().target, "/x");
        assert_eq!(l.next_mount().unwrap().unwrap().target, "/y");
        assert!(l.next_mount().unwrap().is_none());
    }
}
