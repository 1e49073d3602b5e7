fn main() {
    stratum_proxy::main();
}
