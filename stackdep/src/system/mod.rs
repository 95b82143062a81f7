//! Arc/swap transition system.

mod oracle;
pub use self::oracle::{
    crosses, detect_swap_indices, has_dependents_in_buffer, ArcSwapOracle, OracleError,
};

mod parser;
pub use self::parser::{GreedyParser, ParseOutcome};

mod state;
pub use self::state::ParserState;

mod transition;
pub use self::transition::{Action, ActionSet, SwapIndices, Transition, TransitionError};
