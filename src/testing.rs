//! Helpers for testing pipelines.
//!
//! - **Assertions**: compare pipeline outputs, ordered or as multisets, and
//!   check predicates or row fields across a collection.
//! - **Fixtures**: small row datasets and a [`counting_source`] that records how
//!   many elements a pipeline actually pulled.
//!
//! ```
//! use rowbeam::testing::*;
//!
//! let (people, pulled) = counting_source(sample_people());
//! let adults = people.filter(|r| r.try_get_typed::<i64>("age").is_some_and(|a| a >= 25));
//! assert_eq!(pulled.get(), 0);
//!
//! let names = adults.map(|r| r.get_typed::<String>("name").unwrap()).to_list().unwrap();
//! assert_collections_unordered_equal(&names, &["Alice", "Bob", "Charlie", "Diana"].map(String::from));
//! assert_eq!(pulled.get(), 5);
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
