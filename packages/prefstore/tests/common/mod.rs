#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use prefstore::{
    Convertible, ConvertibleCodec, JsonCodec, MemoryStore, RawCodec, RawRepresentable, Storable,
    Store,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Direction {
    North = 0,
    West = 1,
    South = 2,
    East = 3,
}

impl RawRepresentable for Direction {
    type Raw = i64;

    fn raw_value(&self) -> i64 {
        *self as i64
    }

    fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Direction::North),
            1 => Some(Direction::West),
            2 => Some(Direction::South),
            3 => Some(Direction::East),
            _ => None,
        }
    }
}

impl Storable for Direction {
    type Codec = RawCodec;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Convertible for Point {
    type Converted = BTreeMap<String, f64>;

    fn convert(&self) -> Self::Converted {
        BTreeMap::from([("x".to_string(), self.x), ("y".to_string(), self.y)])
    }

    fn reverse(map: Self::Converted) -> Option<Self> {
        Some(Point {
            x: *map.get("x")?,
            y: *map.get("y")?,
        })
    }
}

impl Storable for Point {
    type Codec = ConvertibleCodec;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub tags: Vec<String>,
}

impl Storable for Account {
    type Codec = JsonCodec;
}

pub fn memory() -> (Arc<MemoryStore>, Arc<dyn Store>) {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn Store> = store.clone();
    (store, shared)
}
