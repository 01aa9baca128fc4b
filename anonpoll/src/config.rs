use crate::*;
use std::env::var;
use std::str::FromStr;

/// Longest validity window a decryption request may ask for
pub const MAX_REQUEST_VALIDITY_DAYS: u32 = 365;

/// Ledger policy
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Name of the signing domain decryption requests must be bound to
    pub domain_name: String,

    /// Longest accepted poll question, in characters. Unset accepts any length.
    pub max_question_len: Option<usize>,

    /// Longest validity window accepted on a decryption request
    pub max_request_validity_days: u32,

    /// Fewest ballots a tally pair must cover before it may be disclosed.
    ///
    /// Zero disables the check. With very few voters an aggregate can reveal
    /// individual choices (a poll with one ballot discloses that ballot).
    pub min_disclosure_ballots: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            domain_name: "anonpoll".to_owned(),
            max_question_len: None,
            max_request_validity_days: MAX_REQUEST_VALIDITY_DAYS,
            min_disclosure_ballots: 0,
        }
    }
}

impl Config {
    /// Read the configuration from `ANONPOLL_*` environment variables, falling
    /// back to defaults for any that are unset
    pub fn from_env() -> Result<Self, Error> {
        Config::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let config = Config {
            domain_name: lookup("ANONPOLL_DOMAIN_NAME").unwrap_or(defaults.domain_name),
            max_question_len: parse(&lookup, "ANONPOLL_MAX_QUESTION_LEN")?
                .or(defaults.max_question_len),
            max_request_validity_days: parse(&lookup, "ANONPOLL_MAX_REQUEST_DAYS")?
                .unwrap_or(defaults.max_request_validity_days),
            min_disclosure_ballots: parse(&lookup, "ANONPOLL_MIN_DISCLOSURE_BALLOTS")?
                .unwrap_or(defaults.min_disclosure_ballots),
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.domain_name.is_empty() {
            return Err(Error::Config("domain name must not be empty".to_owned()));
        }
        if self.max_question_len == Some(0) {
            return Err(Error::Config("max_question_len must be at least 1".to_owned()));
        }
        if self.max_request_validity_days == 0
            || self.max_request_validity_days > MAX_REQUEST_VALIDITY_DAYS
        {
            return Err(Error::Config(format!(
                "max_request_validity_days must be between 1 and {}",
                MAX_REQUEST_VALIDITY_DAYS
            )));
        }
        Ok(())
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", key, e))),
        None => Ok(None),
    }
}
