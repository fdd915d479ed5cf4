//! Cell and token types shared by the grid and the view model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A player's marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    A,
    B,
}

impl Token {
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// State of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GridCell {
    #[default]
    Empty,
    TokenA,
    TokenB,
}

impl GridCell {
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }

    /// The token occupying this cell, if any.
    #[must_use]
    pub fn token(self) -> Option<Token> {
        match self {
            Self::Empty => None,
            Self::TokenA => Some(Token::A),
            Self::TokenB => Some(Token::B),
        }
    }
}

impl From<Token> for GridCell {
    fn from(token: Token) -> Self {
        match token {
            Token::A => Self::TokenA,
            Token::B => Self::TokenB,
        }
    }
}
