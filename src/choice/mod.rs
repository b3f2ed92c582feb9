pub mod definition;
pub mod value;

pub use definition::{
    ChoiceDefinition, ChoiceDefinitionBuilder, TransitionChoiceDefinition, TransitionRestriction,
};
pub use value::ChoiceValue;
