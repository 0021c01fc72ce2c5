mod fields;
mod line_item;
mod rate_key;
mod rate_record;
mod sphere;

pub use fields::{FieldMap, fields_from_json};
pub use line_item::LineItem;
pub use rate_key::{RateKey, RateKind};
pub use rate_record::{ProductRate, RateRecord, ServiceRate};
pub use sphere::Sphere;
