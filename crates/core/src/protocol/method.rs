use std::fmt;
use std::str::FromStr;

/// The RTSP/1.0 method vocabulary (RFC 2326 §10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Announce,
    Describe,
    Setup,
    Teardown,
    Play,
    Pause,
    Record,
    Redirect,
    GetParameter,
    SetParameter,
}

impl Method {
    /// All recognized methods, in the order advertised by `Public`.
    pub const ALL: [Method; 11] = [
        Method::Options,
        Method::Announce,
        Method::Describe,
        Method::Setup,
        Method::Teardown,
        Method::Play,
        Method::Pause,
        Method::Record,
        Method::Redirect,
        Method::GetParameter,
        Method::SetParameter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Announce => "ANNOUNCE",
            Method::Describe => "DESCRIBE",
            Method::Setup => "SETUP",
            Method::Teardown => "TEARDOWN",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Record => "RECORD",
            Method::Redirect => "REDIRECT",
            Method::GetParameter => "GET_PARAMETER",
            Method::SetParameter => "SET_PARAMETER",
        }
    }

    /// Value of the `Public` header sent in reply to OPTIONS (RFC 2326 §12.28).
    pub fn public_header() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`Method::from_str`] for tokens outside the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    /// Method tokens are case-sensitive (RFC 2326 §10).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_header_lists_methods_in_fixed_order() {
        assert_eq!(
            Method::public_header(),
            "OPTIONS,ANNOUNCE,DESCRIBE,SETUP,TEARDOWN,PLAY,PAUSE,RECORD,REDIRECT,GET_PARAMETER,SET_PARAMETER"
        );
    }

    #[test]
    fn parse_known_and_unknown_tokens() {
        assert_eq!("GET_PARAMETER".parse::<Method>(), Ok(Method::GetParameter));
        assert_eq!("SETUP".parse::<Method>(), Ok(Method::Setup));
        assert!("setup".parse::<Method>().is_err());
        assert!("FLUSH".parse::<Method>().is_err());
    }
}
