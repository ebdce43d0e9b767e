/// Capacity after growing `current` until it holds `required` elements.
///
/// Doubles from `current` (or 1 for an empty buffer). Never shrinks: when `required`
/// already fits, `current` is returned unchanged.
pub fn grown_capacity(current: usize, required: usize) -> usize {
    let mut capacity = current.max(1);
    while capacity < required {
        capacity = match capacity.checked_mul(2) {
            Some(next) => next,
            None => return required,
        };
    }
    capacity.max(current)
}
