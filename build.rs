fn main() {
    // ESP-IDF link arguments are only relevant when the espidf feature
    // is enabled (device builds); host test builds skip them.
    if std::env::var_os("CARGO_FEATURE_ESPIDF").is_some() {
        embuild::espidf::sysenv::output();
    }
}
