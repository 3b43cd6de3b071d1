fn main() {
    // Declare the custom cfg so rustc knows about it
    println!("cargo::rustc-check-cfg=cfg(has_deepseek_key)");
    println!("cargo:rerun-if-env-changed=AUTOKLEPT_DEEPSEEK_API_KEY");

    // Live completion tests only run when a DeepSeek key is available at build time
    if let Ok(api_key) = std::env::var("AUTOKLEPT_DEEPSEEK_API_KEY")
        && !api_key.is_empty()
    {
        println!("cargo:rustc-cfg=has_deepseek_key");
    }
}
