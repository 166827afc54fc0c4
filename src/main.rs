fn main() {
    docdrop::run();
}
