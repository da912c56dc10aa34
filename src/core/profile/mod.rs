mod model;

pub use model::Profile;
