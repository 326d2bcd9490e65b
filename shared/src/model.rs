use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

typed_id!(ProductId);
typed_id!(TempId);

impl TempId {
    const PREFIX: &'static str = "tmp-";

    /// Locally generated id for an addition the server has not assigned yet.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, Uuid::new_v4()))
    }

    /// Whether `id` was minted by [`TempId::generate`].
    ///
    /// Decided by the `tmp-` prefix alone, so server-assigned ids must never
    /// start with it; the store would refuse to edit such products.
    pub fn is_temporary(id: &str) -> bool {
        id.starts_with(Self::PREFIX)
    }
}

/// Anything the store can keep by id.
///
/// `Draft` is the id-less payload used to create a new entity; the outbox
/// materializes it under a temporary id so it can be shown before the server
/// assigns the real one.
pub trait Entity: Clone + fmt::Debug + PartialEq {
    type Draft: Clone + fmt::Debug + PartialEq;

    fn id(&self) -> &str;

    fn from_draft(id: &str, draft: &Self::Draft) -> Self;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: ProductId::new(id),
            name: name.into(),
            price,
        }
    }

    /// Full post-update value for the "double price" intent.
    #[must_use]
    pub fn with_doubled_price(&self) -> Self {
        Self {
            price: self.price * 2.0,
            ..self.clone()
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }

    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
        }
    }
}

impl Entity for Product {
    type Draft = NewProduct;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn from_draft(id: &str, draft: &NewProduct) -> Self {
        draft.clone().into_product(ProductId::new(id))
    }
}

/// A projected item: the entity's own fields plus whether it is still
/// waiting on the backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Tracked<T> {
    #[serde(flatten)]
    pub entity: T,
    pub pending: bool,
}

impl<T> Tracked<T> {
    pub fn confirmed(entity: T) -> Self {
        Self {
            entity,
            pending: false,
        }
    }

    pub fn pending(entity: T) -> Self {
        Self {
            entity,
            pending: true,
        }
    }
}

pub type ProductView = Tracked<Product>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_ids_are_unique_and_marked() {
        let a = TempId::generate();
        let b = TempId::generate();
        assert_ne!(a, b);
        assert!(TempId::is_temporary(a.as_str()));
        assert!(!TempId::is_temporary("42"));
    }

    #[test]
    fn temporary_is_decided_by_prefix_only() {
        assert!(TempId::is_temporary("tmp-from-anywhere"));
        assert!(!TempId::is_temporary("item-tmp-1"));
        assert!(!TempId::is_temporary("TMP-1"));
    }

    #[test]
    fn doubling_keeps_identity_and_name() {
        let p = Product::new("1", "X", 10.0);
        let doubled = p.with_doubled_price();
        assert_eq!(doubled.id, p.id);
        assert_eq!(doubled.name, "X");
        assert_eq!(doubled.price, 20.0);
        assert_eq!(p.price, 10.0);
    }

    #[test]
    fn draft_materializes_under_given_id() {
        let draft = NewProduct::new("Y", 5.0);
        let p = Product::from_draft("tmp-1", &draft);
        assert_eq!(p, Product::new("tmp-1", "Y", 5.0));
    }

    #[test]
    fn view_serializes_flat() {
        let view = ProductView::pending(Product::new("1", "X", 10.0));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "1", "name": "X", "price": 10.0, "pending": true})
        );
    }
}
