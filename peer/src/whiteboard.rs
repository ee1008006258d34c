//! Shared whiteboard state: grid, background image and tokens
//!
//! Every peer holds its own copy. Local edits and inbound updates are applied
//! the same way, in the order this peer processes them, so the last applied
//! update wins. Nothing is versioned, and two peers that process concurrent
//! moves in different orders keep different positions.

use log::debug;
use rand::Rng;
use shared::{
    Position, Token, TokenId, DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH, MAX_GRID_DIMENSION,
};
use std::collections::HashMap;
use thiserror::Error;

/// Color for tokens first seen through a remote move.
pub const UNKNOWN_TOKEN_COLOR: &str = "#808080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WhiteboardError {
    #[error("no token with id {0}")]
    UnknownToken(TokenId),
    #[error("grid size {width}x{height} is outside 1..={max}")]
    GridOutOfRange { width: u32, height: u32, max: u32 },
}

#[derive(Debug, Clone)]
pub struct WhiteboardState {
    grid_width: u32,
    grid_height: u32,
    background: Option<Vec<u8>>,
    tokens: HashMap<TokenId, Token>,
}

impl Default for WhiteboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WhiteboardState {
    pub fn new() -> Self {
        Self {
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            background: None,
            tokens: HashMap::new(),
        }
    }

    pub fn grid_width(&self) -> u32 {
        self.grid_width
    }

    pub fn grid_height(&self) -> u32 {
        self.grid_height
    }

    pub fn clamp(&self, position: Position) -> Position {
        position.clamped(self.grid_width, self.grid_height)
    }

    /// Adds a token at the origin with a fresh id. Local only.
    pub fn create_token(&mut self, color: impl Into<String>) -> Token {
        let token = Token::new(TokenId::generate(), color);
        self.tokens.insert(token.id.clone(), token.clone());
        token
    }

    /// Moves a token this peer already knows about. Returns the clamped
    /// position actually stored.
    pub fn move_token(
        &mut self,
        id: &TokenId,
        position: Position,
    ) -> Result<Position, WhiteboardError> {
        let clamped = self.clamp(position);
        let token = self
            .tokens
            .get_mut(id)
            .ok_or_else(|| WhiteboardError::UnknownToken(id.clone()))?;
        token.position = clamped;
        Ok(clamped)
    }

    /// Applies a move received from another peer.
    ///
    /// Tokens are created locally and never announced, so a remote move is
    /// often the first time this peer hears of a token; it is materialized
    /// with a neutral color.
    pub fn apply_remote_move(&mut self, id: &TokenId, position: Position) -> Position {
        let clamped = self.clamp(position);
        self.tokens
            .entry(id.clone())
            .and_modify(|token| token.position = clamped)
            .or_insert_with(|| {
                debug!("Materializing token {} from remote move", id);
                Token {
                    id: id.clone(),
                    color: UNKNOWN_TOKEN_COLOR.to_string(),
                    position: clamped,
                }
            });
        clamped
    }

    pub fn set_background(&mut self, image: Vec<u8>) {
        self.background = Some(image);
    }

    pub fn background(&self) -> Option<&[u8]> {
        self.background.as_deref()
    }

    /// Changes the local grid size and pulls tokens back inside it.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), WhiteboardError> {
        let valid = 1..=MAX_GRID_DIMENSION;
        if !valid.contains(&width) || !valid.contains(&height) {
            return Err(WhiteboardError::GridOutOfRange {
                width,
                height,
                max: MAX_GRID_DIMENSION,
            });
        }

        self.grid_width = width;
        self.grid_height = height;
        for token in self.tokens.values_mut() {
            token.position = token.position.clamped(width, height);
        }
        Ok(())
    }

    pub fn token(&self, id: &TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    /// Tokens sorted by id.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens: Vec<&Token> = self.tokens.values().collect();
        tokens.sort_by(|a, b| a.id.cmp(&b.id));
        tokens
    }

    pub fn tokens_at(&self, position: Position) -> Vec<&Token> {
        self.tokens()
            .into_iter()
            .filter(|token| token.position == position)
            .collect()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Random `#rrggbb` color for a new token.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..=0xFF_FFFFu32))
}
