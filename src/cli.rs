use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Command-line options for the headless script harness. Every flag takes a
/// value, either inline (`--frames=30`) or as the following argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessOptions {
    pub settings: Option<PathBuf>,
    pub frames: u32,
    pub debug: Option<bool>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self { settings: None, frames: 120, debug: None }
    }
}

impl HarnessOptions {
    pub fn from_env() -> Result<Self> {
        Self::from_args(std::env::args().skip(1))
    }

    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            let arg = arg.as_ref();
            let (name, inline) = match arg.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (arg, None),
            };
            let value = match inline {
                Some(value) => value,
                None => iter
                    .next()
                    .map(|next| next.as_ref().to_string())
                    .with_context(|| format!("flag '{name}' needs a value"))?,
            };
            match name {
                "--settings" => options.settings = Some(PathBuf::from(value)),
                "--frames" => {
                    options.frames = value
                        .parse()
                        .with_context(|| format!("frame count '{value}' is not a number"))?;
                }
                "--debug" => {
                    options.debug = Some(match value.as_str() {
                        "on" | "true" | "1" => true,
                        "off" | "false" | "0" => false,
                        other => bail!("'--debug' takes on or off, got '{other}'"),
                    });
                }
                other => {
                    bail!("unrecognized flag '{other}' (expected --settings, --frames or --debug)")
                }
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_inline_and_separated_values() {
        let options =
            HarnessOptions::from_args(["--frames=30", "--settings", "proj/scripts.json", "--debug=on"])
                .expect("options should parse");
        assert_eq!(options.frames, 30);
        assert_eq!(options.settings, Some(PathBuf::from("proj/scripts.json")));
        assert_eq!(options.debug, Some(true));
    }

    #[test]
    fn defaults_apply_when_flags_are_absent() {
        let options = HarnessOptions::from_args(Vec::<String>::new()).expect("empty args parse");
        assert_eq!(options, HarnessOptions::default());
        assert_eq!(options.frames, 120);
    }

    #[test]
    fn a_flag_without_a_value_errors() {
        let err = HarnessOptions::from_args(["--frames"]).unwrap_err();
        assert!(err.to_string().contains("needs a value"), "unexpected error: {err}");
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let err = HarnessOptions::from_args(["--fps=60"]).unwrap_err();
        assert!(err.to_string().contains("unrecognized flag"), "unexpected error: {err}");
    }
}
