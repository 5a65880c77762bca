use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type MovieId = i32;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub rating: f64,
}
