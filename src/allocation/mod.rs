mod draft;
mod workflow;

pub use draft::{parse_allocation_input, AllocationDraft, AllocationState};
pub use workflow::{
    allocate_remainder, create_payment, create_payment_with_allocations, draft_for_payment,
    draft_for_request, path_for, remove_allocation, submit, AllocationPath, CreatedPayment,
};
