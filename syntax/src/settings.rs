//! Keyword settings files.
//!
//! Lines are `KEY` or `KEY=VALUE`; keys are case-insensitive. `FS-` keys tune growth, `RC-` keys
//! tune ring-closure bookkeeping:
//!
//! | key | value |
//! |-----|-------|
//! | `FS-GrowthProbScheme`, `FS-CrowdProbScheme` | `EXP_DIFF`, `TANH`, `SIGMA`, `UNRESTRICTED` |
//! | `FS-GrowthMultiplier`, `FS-CrowdMultiplier` | λ of `EXP_DIFF` and `TANH` |
//! | `FS-GrowthSigmaSteepness`, `FS-CrowdSigmaSteepness` | steepness of `SIGMA` |
//! | `FS-GrowthSigmaMiddle`, `FS-CrowdSigmaMiddle` | middle of `SIGMA` |
//! | `FS-SymmetryProbability` | probability |
//! | `FS-EnforceSymmetry` | flag |
//! | `RC-CloseRings` | flag |
//! | `RC-BiasClosableChains` | flag |
//! | `RC-LockAttempts` | count |
//! | `RC-LockRetryDelay` | milliseconds |
//!
//! Flags may be given bare or as `=true`/`=false`.

use crate::lexeme::{line_end, word};
use crate::{LoadResult, ParserExtra, Spanned, SyntaxError, parse_lines, syntax_report};
use blockspace::{GrowthSettings, ProbabilityScheme};
use chumsky::prelude::*;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemeKind {
    ExpDiff,
    Tanh,
    Sigma,
    Unrestricted,
}

/// One parameter of a probability scheme.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchemeField {
    Kind(SchemeKind),
    Lambda(f64),
    Steepness(f64),
    Middle(f64),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Setting {
    Growth(SchemeField),
    Crowding(SchemeField),
    SymmetryProbability(f64),
    EnforceSymmetry(bool),
    RingClosures(bool),
    ClosableChainBias(bool),
    LockAttempts(u32),
    LockRetryDelay(Duration),
}

fn value<T: std::str::FromStr>(key: &str, value: Option<&str>) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    let raw = value.ok_or_else(|| format!("{key} needs a value"))?;
    raw.parse()
        .map_err(|e| format!("invalid value {raw:?} for {key}: {e}"))
}

fn flag(key: &str, value: Option<&str>) -> Result<bool, String> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None | Some("true") | Some("yes") => Ok(true),
        Some("false") | Some("no") => Ok(false),
        Some(other) => Err(format!("{key} is a flag, got {other:?}")),
    }
}

fn scheme_kind(key: &str, raw: Option<&str>) -> Result<SchemeKind, String> {
    match raw.map(str::to_ascii_uppercase).as_deref() {
        Some("EXP_DIFF") => Ok(SchemeKind::ExpDiff),
        Some("TANH") => Ok(SchemeKind::Tanh),
        Some("SIGMA") => Ok(SchemeKind::Sigma),
        Some("UNRESTRICTED") => Ok(SchemeKind::Unrestricted),
        Some(other) => Err(format!("unknown probability scheme {other:?} for {key}")),
        None => Err(format!("{key} needs a value")),
    }
}

/// Maps one keyword onto a setting.
pub fn interpret(key: &str, raw: Option<&str>) -> Result<Setting, String> {
    let upper = key.to_ascii_uppercase();
    let (scope, name) = match upper.split_once('-') {
        Some((scope @ ("FS" | "RC"), name)) => (scope, name),
        _ => return Err(format!("{key} is neither an FS- nor an RC- keyword")),
    };
    let scheme = |field: &str| -> Result<Option<SchemeField>, String> {
        Ok(Some(match field {
            "PROBSCHEME" => SchemeField::Kind(scheme_kind(key, raw)?),
            "MULTIPLIER" => SchemeField::Lambda(value(key, raw)?),
            "SIGMASTEEPNESS" => SchemeField::Steepness(value(key, raw)?),
            "SIGMAMIDDLE" => SchemeField::Middle(value(key, raw)?),
            _ => return Ok(None),
        }))
    };
    let setting = match (scope, name) {
        ("FS", "SYMMETRYPROBABILITY") => Setting::SymmetryProbability(value(key, raw)?),
        ("FS", "ENFORCESYMMETRY") => Setting::EnforceSymmetry(flag(key, raw)?),
        ("FS", name) if name.starts_with("GROWTH") => match scheme(&name["GROWTH".len()..])? {
            Some(field) => Setting::Growth(field),
            None => return Err(format!("unknown keyword {key}")),
        },
        ("FS", name) if name.starts_with("CROWD") => match scheme(&name["CROWD".len()..])? {
            Some(field) => Setting::Crowding(field),
            None => return Err(format!("unknown keyword {key}")),
        },
        ("RC", "CLOSERINGS") => Setting::RingClosures(flag(key, raw)?),
        ("RC", "BIASCLOSABLECHAINS") => Setting::ClosableChainBias(flag(key, raw)?),
        ("RC", "LOCKATTEMPTS") => Setting::LockAttempts(value(key, raw)?),
        ("RC", "LOCKRETRYDELAY") => {
            Setting::LockRetryDelay(Duration::from_millis(value(key, raw)?))
        }
        _ => return Err(format!("unknown keyword {key}")),
    };
    Ok(setting)
}

/// One keyword line.
pub fn setting<'src>() -> impl Parser<'src, &'src str, Setting, ParserExtra<'src>> {
    let key = word().labelled("keyword");
    let value = any()
        .filter(|c: &char| *c != '#')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(str::trim)
        .labelled("value");
    text::inline_whitespace()
        .ignore_then(key)
        .then(
            just('=')
                .padded_by(text::inline_whitespace())
                .ignore_then(value)
                .or_not(),
        )
        .then_ignore(line_end())
        .try_map(|(key, raw), span| interpret(key, raw).map_err(|msg| Rich::custom(span, msg)))
}

pub fn parse_settings(src: &str) -> (Vec<Spanned<Setting>>, Vec<SyntaxError>) {
    parse_lines(src, setting())
}

/// A probability scheme being assembled from separate keywords.
#[derive(Clone, Copy, Debug)]
struct SchemeDraft {
    kind: SchemeKind,
    lambda: f64,
    steepness: f64,
    middle: f64,
}

impl From<ProbabilityScheme> for SchemeDraft {
    fn from(scheme: ProbabilityScheme) -> Self {
        let mut draft = SchemeDraft {
            kind: SchemeKind::ExpDiff,
            lambda: 1.0,
            steepness: 1.0,
            middle: 2.5,
        };
        match scheme {
            ProbabilityScheme::ExpDiff { lambda } => draft.lambda = lambda,
            ProbabilityScheme::Tanh { lambda } => {
                draft.kind = SchemeKind::Tanh;
                draft.lambda = lambda;
            }
            ProbabilityScheme::Sigma { steepness, middle } => {
                draft.kind = SchemeKind::Sigma;
                draft.steepness = steepness;
                draft.middle = middle;
            }
            ProbabilityScheme::Unrestricted => draft.kind = SchemeKind::Unrestricted,
        }
        draft
    }
}

impl SchemeDraft {
    fn apply(&mut self, field: SchemeField) {
        match field {
            SchemeField::Kind(kind) => self.kind = kind,
            SchemeField::Lambda(lambda) => self.lambda = lambda,
            SchemeField::Steepness(steepness) => self.steepness = steepness,
            SchemeField::Middle(middle) => self.middle = middle,
        }
    }

    fn build(self) -> ProbabilityScheme {
        match self.kind {
            SchemeKind::ExpDiff => ProbabilityScheme::ExpDiff {
                lambda: self.lambda,
            },
            SchemeKind::Tanh => ProbabilityScheme::Tanh {
                lambda: self.lambda,
            },
            SchemeKind::Sigma => ProbabilityScheme::Sigma {
                steepness: self.steepness,
                middle: self.middle,
            },
            SchemeKind::Unrestricted => ProbabilityScheme::Unrestricted,
        }
    }
}

/// Applies `settings` in order on top of `base`. Later keywords win.
pub fn apply_settings<'a>(
    base: GrowthSettings,
    settings: impl IntoIterator<Item = &'a Setting>,
) -> GrowthSettings {
    let mut growth = SchemeDraft::from(base.growth);
    let mut crowding = SchemeDraft::from(base.crowding);
    let mut out = base;
    let mut lock_attempts = out.ring_closures.lock_attempts;
    let mut lock_delay = out.ring_closures.lock_retry_delay;
    for setting in settings {
        match *setting {
            Setting::Growth(field) => growth.apply(field),
            Setting::Crowding(field) => crowding.apply(field),
            Setting::SymmetryProbability(p) => out = out.with_symmetry_probability(p),
            Setting::EnforceSymmetry(on) => out = out.with_enforced_symmetry(on),
            Setting::RingClosures(on) => out.ring_closures.enabled = on,
            Setting::ClosableChainBias(on) => out.ring_closures.closable_chain_bias = on,
            Setting::LockAttempts(n) => lock_attempts = n,
            Setting::LockRetryDelay(delay) => lock_delay = delay,
        }
    }
    out.ring_closures = out.ring_closures.with_lock_retry(lock_attempts, lock_delay);
    out.with_growth(growth.build()).with_crowding(crowding.build())
}

/// Parses `src` and applies it on top of the default settings.
pub fn load_settings(src: &str) -> LoadResult<GrowthSettings> {
    let (settings, errors) = parse_settings(src);
    if !errors.is_empty() {
        return Err(syntax_report(&errors));
    }
    Ok(apply_settings(
        GrowthSettings::default(),
        settings.iter().map(|(s, _)| s),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn scheme_parameters_combine() {
        let src = "\
FS-GrowthProbScheme=SIGMA
fs-growthsigmasteepness = 2.0
FS-GrowthSigmaMiddle=3  # depth
FS-CrowdMultiplier=0.5
FS-EnforceSymmetry
RC-CloseRings=true
RC-LockRetryDelay=10
";
        let settings = load_settings(src).unwrap();
        assert_eq!(
            settings.growth,
            ProbabilityScheme::Sigma {
                steepness: 2.0,
                middle: 3.0
            }
        );
        assert_eq!(settings.crowding, ProbabilityScheme::ExpDiff { lambda: 0.5 });
        assert!(settings.enforce_symmetry);
        assert!(settings.ring_closures.enabled);
        assert!(!settings.ring_closures.closable_chain_bias);
        assert_eq!(settings.ring_closures.lock_retry_delay, Duration::from_millis(10));
    }

    #[test_log::test]
    fn unknown_keywords_and_bad_values() {
        assert!(interpret("GA-PopulationSize", Some("10")).is_err());
        assert!(interpret("FS-GrowthShape", Some("1")).is_err());
        assert!(interpret("FS-SymmetryProbability", None).is_err());
        assert!(interpret("FS-SymmetryProbability", Some("high")).is_err());
        assert!(interpret("RC-CloseRings", Some("maybe")).is_err());
        assert_eq!(
            interpret("rc-lockattempts", Some("3")),
            Ok(Setting::LockAttempts(3))
        );
        let (_, errors) = parse_settings("FS-GrowthProbScheme=CUBIC\n");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("CUBIC"));
    }
}
