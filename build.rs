fn main() {
    // Exports the ESP-IDF build environment to the compiler when
    // cross-compiling for the target. On host builds (no `espidf`
    // feature) there is nothing to export.
    if std::env::var_os("CARGO_FEATURE_ESPIDF").is_some() {
        embuild::espidf::sysenv::output();
    }
}
