bitflags::bitflags! {
	/// Modifiers for store operations.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Flags: u8 {
		/// Don't run subscribed callbacks, even if the value changed.
		const NO_CALLBACKS    = 0b0000_0001;
		/// Run subscribed callbacks even if nothing changed.
		const FORCE_CALLBACKS = 0b0000_0010;
		/// [`on`](`crate::Model::on_with`): call the callback once right away.
		const IMMEDIATELY     = 0b0000_0100;
		/// Keep nested instances alive when a `MODEL` or `ARRAY_MODEL` property lets go of them.
		const NO_DESTROY      = 0b0000_1000;
		/// Report a deep copy as the previous value instead of the (mutated) live container.
		const CLONE_PREVIOUS  = 0b0001_0000;
		/// Skip auto-save for this write.
		const NO_SAVE         = 0b0010_0000;
	}
}
