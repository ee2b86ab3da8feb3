pub mod symbols;
pub mod translate;

/// Global output flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct OutputContext {
    pub json: bool,
    pub verbose: bool,
}
