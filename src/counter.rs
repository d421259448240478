use crate::error::Error;
use num_traits::{CheckedAdd, One, Zero};

/// Hands out strictly increasing ids, starting at one.
///
/// Never wraps: once `C::max_value()` was handed out, [`Counter::next`] fails with [`Error::CounterSaturated`].
#[derive(Debug, Clone)]
pub struct Counter<C = u64>(C)
where
	C: CheckedAdd + One + Zero + Copy;

impl<C> Default for Counter<C>
where
	C: CheckedAdd + One + Zero + Copy,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<C> Counter<C>
where
	C: CheckedAdd + One + Zero + Copy,
{
	#[must_use]
	pub fn new() -> Self {
		Self(C::zero())
	}

	/// The most recently handed out id, or zero.
	#[must_use]
	pub fn current(&self) -> C {
		self.0
	}

	/// # Errors
	///
	/// Iff the counter would overflow.
	#[allow(clippy::should_implement_trait)]
	pub fn next(&mut self) -> Result<C, Error> {
		self.0 = self.0.checked_add(&C::one()).ok_or(Error::CounterSaturated)?;
		Ok(self.0)
	}
}
