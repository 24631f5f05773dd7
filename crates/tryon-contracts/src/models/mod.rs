mod avatar;
mod gallery;
mod wardrobe;

pub use avatar::AvatarStyle;
pub use gallery::{Gallery, TryOnResult};
pub use wardrobe::{
    ClothingDetails, ClothingField, MeasurementField, Measurements, CLOTHING_FITS, CLOTHING_TYPES,
};
