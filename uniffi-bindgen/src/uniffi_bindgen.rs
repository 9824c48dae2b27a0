//! Generates Swift and Kotlin bindings for `notifykit-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
