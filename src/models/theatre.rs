use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type TheatreId = i32;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Theatre {
    pub id: TheatreId,
    pub name: String,
}
