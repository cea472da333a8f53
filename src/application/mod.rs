// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal per use
// case (training a model, or answering with a trained one).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No CLI parsing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Rust Book §7 (Module System)

// The training workflow
pub mod train_use_case;

// The prediction workflow
pub mod predict_use_case;
