pub mod compiler;
pub mod feedback;
pub mod filters;
pub mod intent;
pub mod relax;
pub mod result;
pub mod rules;
pub mod syntax;
pub mod vocab;
